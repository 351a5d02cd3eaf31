// FAT16 directory entries and directory scanning
//
// The root directory lives in a fixed table right after the FATs; every other
// directory is a cluster chain in the data region. `DirectoryLocation` names
// which of the two a scan reads, and `DirectoryEntries` hides the difference.

use super::boot_sector::VolumeGeometry;
use super::cluster_chain::ClusterChain;
use super::short_name::{ShortName, SHORT_NAME_LEN};
use super::timestamps::{fat_date_to_unix, fat_datetime_to_unix};
use crate::device_reader::{read_sector, ByteSource};
use byteorder::{ByteOrder, LittleEndian};
use fatbridge_core::BridgeError;
use log::trace;

pub const DIR_ENTRY_SIZE: usize = 32;

/// First name byte of the slot after the last used entry.
pub const END_OF_DIRECTORY: u8 = 0x00;
/// First name byte of a deleted entry.
pub const DELETED_ENTRY: u8 = 0xE5;

/// FAT Directory Entry Attributes
pub struct FatAttributes;

impl FatAttributes {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
    pub const LONG_NAME: u8 = Self::READ_ONLY | Self::HIDDEN | Self::SYSTEM | Self::VOLUME_ID;
}

/// A decoded 32-byte directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: ShortName,
    pub attributes: u8,
    pub nt_reserved: u8,
    pub creation_time_tenth: u8,
    pub creation_time: u16,
    pub creation_date: u16,
    pub last_access_date: u16,
    /// Always zero on FAT16.
    pub first_cluster_high: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster_low: u16,
    pub file_size: u32,
}

impl DirEntry {
    pub fn parse(bytes: &[u8]) -> Result<Self, BridgeError> {
        if bytes.len() < DIR_ENTRY_SIZE {
            return Err(BridgeError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("directory entry is {} bytes, expected {}", bytes.len(), DIR_ENTRY_SIZE),
            )));
        }

        let mut name = [0u8; SHORT_NAME_LEN];
        name.copy_from_slice(&bytes[..SHORT_NAME_LEN]);

        Ok(DirEntry {
            name: ShortName::from_raw(name),
            attributes: bytes[11],
            nt_reserved: bytes[12],
            creation_time_tenth: bytes[13],
            creation_time: LittleEndian::read_u16(&bytes[14..]),
            creation_date: LittleEndian::read_u16(&bytes[16..]),
            last_access_date: LittleEndian::read_u16(&bytes[18..]),
            first_cluster_high: LittleEndian::read_u16(&bytes[20..]),
            write_time: LittleEndian::read_u16(&bytes[22..]),
            write_date: LittleEndian::read_u16(&bytes[24..]),
            first_cluster_low: LittleEndian::read_u16(&bytes[26..]),
            file_size: LittleEndian::read_u32(&bytes[28..]),
        })
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & FatAttributes::DIRECTORY != 0
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes & FatAttributes::READ_ONLY != 0
    }

    pub fn first_cluster(&self) -> u16 {
        self.first_cluster_low
    }

    pub fn display_name(&self) -> String {
        self.name.decode()
    }

    pub fn modified(&self) -> Option<u64> {
        fat_datetime_to_unix(self.write_date, self.write_time)
    }

    pub fn created(&self) -> Option<u64> {
        fat_datetime_to_unix(self.creation_date, self.creation_time)
    }

    pub fn accessed(&self) -> Option<u64> {
        fat_date_to_unix(self.last_access_date)
    }
}

/// Where a directory's entries are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryLocation {
    /// The fixed root directory table.
    Root,
    /// A directory in the data region, by first cluster.
    Cluster(u16),
}

impl DirectoryLocation {
    /// The directory a directory entry points at. `..` entries that lead to
    /// the root carry cluster 0.
    pub fn of(entry: &DirEntry) -> Self {
        match entry.first_cluster() {
            0 => DirectoryLocation::Root,
            cluster => DirectoryLocation::Cluster(cluster),
        }
    }
}

/// A directory entry together with the slot it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedEntry {
    pub entry: DirEntry,
    /// Absolute sector holding the entry.
    pub sector: u32,
    /// Index of the entry within that sector.
    pub slot: usize,
    /// Data cluster holding the entry, `None` inside the root table.
    pub cluster: Option<u16>,
}

enum SectorSource<'a> {
    Root { next: u32, end: u32, entries_left: u32 },
    Chain(ClusterChain<'a>),
}

struct LoadedSector {
    sector: u32,
    cluster: Option<u16>,
    data: Vec<u8>,
}

/// Lazy scan over the live entries of one directory.
///
/// Deleted, volume-label and long-name slots are skipped. The scan ends at the
/// first end-of-directory slot, at the end of the root table, or at the end of
/// the directory's cluster chain.
pub struct DirectoryEntries<'a> {
    geometry: &'a VolumeGeometry,
    source: &'a dyn ByteSource,
    sectors: SectorSource<'a>,
    current: Option<LoadedSector>,
    slot: usize,
    finished: bool,
}

impl<'a> DirectoryEntries<'a> {
    pub fn new(
        location: DirectoryLocation,
        geometry: &'a VolumeGeometry,
        source: &'a dyn ByteSource,
    ) -> Result<Self, BridgeError> {
        let sectors = match location {
            DirectoryLocation::Root => SectorSource::Root {
                next: geometry.first_root_sector,
                end: geometry.first_root_sector + geometry.root_dir_sectors,
                entries_left: geometry.root_entries as u32,
            },
            DirectoryLocation::Cluster(cluster) => {
                SectorSource::Chain(ClusterChain::new(cluster, geometry, source)?)
            }
        };

        Ok(Self { geometry, source, sectors, current: None, slot: 0, finished: false })
    }

    fn load_next_sector(&mut self) -> Result<Option<LoadedSector>, BridgeError> {
        match &mut self.sectors {
            SectorSource::Root { next, end, .. } => {
                if *next >= *end {
                    return Ok(None);
                }
                let sector = *next;
                *next += 1;
                let data = read_sector(self.source, self.geometry.bytes_per_sector, sector)?;
                Ok(Some(LoadedSector { sector, cluster: None, data }))
            }
            SectorSource::Chain(chain) => Ok(chain.next().transpose()?.map(|s| LoadedSector {
                sector: s.sector,
                cluster: Some(s.cluster),
                data: s.data,
            })),
        }
    }

    fn next_entry(&mut self) -> Result<Option<LocatedEntry>, BridgeError> {
        let per_sector = self.geometry.entries_per_sector();

        loop {
            if self.current.is_none() || self.slot >= per_sector {
                match self.load_next_sector()? {
                    Some(sector) => {
                        self.current = Some(sector);
                        self.slot = 0;
                    }
                    None => return Ok(None),
                }
            }

            if let SectorSource::Root { entries_left, .. } = &mut self.sectors {
                if *entries_left == 0 {
                    return Ok(None);
                }
                *entries_left -= 1;
            }

            let Some(current) = self.current.as_ref() else {
                return Ok(None);
            };
            let slot = self.slot;
            self.slot += 1;

            let offset = slot * DIR_ENTRY_SIZE;
            let raw = &current.data[offset..offset + DIR_ENTRY_SIZE];

            match raw[0] {
                END_OF_DIRECTORY => {
                    trace!("End of directory at sector {} slot {}", current.sector, slot);
                    return Ok(None);
                }
                DELETED_ENTRY => continue,
                _ => {}
            }

            let attributes = raw[11];
            if attributes & FatAttributes::LONG_NAME == FatAttributes::LONG_NAME
                || attributes & FatAttributes::VOLUME_ID != 0
            {
                continue;
            }

            return Ok(Some(LocatedEntry {
                entry: DirEntry::parse(raw)?,
                sector: current.sector,
                slot,
                cluster: current.cluster,
            }));
        }
    }
}

impl Iterator for DirectoryEntries<'_> {
    type Item = Result<LocatedEntry, BridgeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
