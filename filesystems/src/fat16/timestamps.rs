// MS-DOS packed date/time decoding for directory entries

use chrono::NaiveDate;

/// Unpacked FAT timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl FatDateTime {
    /// FAT date: bits 15-9: year (0=1980), bits 8-5: month, bits 4-0: day
    /// FAT time: bits 15-11: hours, bits 10-5: minutes, bits 4-0: seconds/2
    pub fn unpack(date: u16, time: u16) -> Self {
        Self {
            year: ((date >> 9) & 0x7F) as i32 + 1980,
            month: ((date >> 5) & 0x0F) as u32,
            day: (date & 0x1F) as u32,
            hour: ((time >> 11) & 0x1F) as u32,
            minute: ((time >> 5) & 0x3F) as u32,
            second: ((time & 0x1F) * 2) as u32,
        }
    }

    /// Seconds since the Unix epoch, reading the stamp as UTC.
    /// `None` when the fields do not form a real calendar date and time.
    pub fn to_unix(&self) -> Option<u64> {
        let dt = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_opt(self.hour, self.minute, self.second)?;
        u64::try_from(dt.and_utc().timestamp()).ok()
    }
}

/// Convert FAT date/time to a Unix timestamp
pub fn fat_datetime_to_unix(date: u16, time: u16) -> Option<u64> {
    FatDateTime::unpack(date, time).to_unix()
}

/// Convert a date-only FAT field (last access) to a Unix timestamp at midnight
pub fn fat_date_to_unix(date: u16) -> Option<u64> {
    fat_datetime_to_unix(date, 0)
}
