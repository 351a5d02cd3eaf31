// FAT16 allocation table lookups

use super::boot_sector::VolumeGeometry;
use crate::device_reader::{read_sector, ByteSource};
use byteorder::{ByteOrder, LittleEndian};
use fatbridge_core::BridgeError;
use log::{trace, warn};

/// FAT16 cluster values with special meanings
pub mod cluster_values {
    pub const FREE_CLUSTER: u16 = 0x0000;
    pub const RESERVED_CLUSTER: u16 = 0x0001;
    pub const FIRST_RESERVED_HIGH: u16 = 0xFFF0;
    pub const BAD_CLUSTER: u16 = 0xFFF7;
    pub const END_OF_CHAIN: u16 = 0xFFF8;
}

/// Meaning of a raw FAT16 entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    Reserved,
    Next(u16),
    Bad,
    EndOfChain,
}

impl FatEntry {
    pub fn from_raw(value: u16) -> Self {
        use cluster_values::*;
        match value {
            FREE_CLUSTER => FatEntry::Free,
            RESERVED_CLUSTER => FatEntry::Reserved,
            v if v >= END_OF_CHAIN => FatEntry::EndOfChain,
            BAD_CLUSTER => FatEntry::Bad,
            v if v >= FIRST_RESERVED_HIGH => FatEntry::Reserved,
            v => FatEntry::Next(v),
        }
    }
}

/// Read the raw FAT entry for `cluster` from the first FAT copy.
pub fn fat_entry(
    cluster: u16,
    geometry: &VolumeGeometry,
    source: &dyn ByteSource,
) -> Result<u16, BridgeError> {
    let fat_offset = cluster as u32 * 2;
    let bps = geometry.bytes_per_sector as u32;
    let fat_sector = geometry.reserved_sectors as u32 + fat_offset / bps;
    let entry_offset = (fat_offset % bps) as usize;

    let sector = read_sector(source, geometry.bytes_per_sector, fat_sector)?;
    let value = LittleEndian::read_u16(&sector[entry_offset..entry_offset + 2]);

    trace!("FAT[{}] = {:#06x} (sector {}, offset {})", cluster, value, fat_sector, entry_offset);
    Ok(value)
}

/// Follow one FAT link. `None` means the chain ends after `cluster`.
///
/// Free, reserved and bad markers inside a chain are treated as its end rather
/// than followed. A link pointing outside the data region is a corrupt chain.
pub fn next_cluster(
    cluster: u16,
    geometry: &VolumeGeometry,
    source: &dyn ByteSource,
) -> Result<Option<u16>, BridgeError> {
    let raw = fat_entry(cluster, geometry, source)?;
    match FatEntry::from_raw(raw) {
        FatEntry::EndOfChain => Ok(None),
        FatEntry::Next(next) if geometry.is_data_cluster(next) => Ok(Some(next)),
        FatEntry::Next(next) => Err(BridgeError::CorruptChain(format!(
            "cluster {} links to {} beyond the last data cluster {}",
            cluster,
            next,
            geometry.last_cluster()
        ))),
        other => {
            warn!("Cluster {} has FAT value {:#06x} ({:?}), ending chain", cluster, raw, other);
            Ok(None)
        }
    }
}

/// Count free clusters by scanning the first FAT.
pub fn count_free_clusters(
    geometry: &VolumeGeometry,
    source: &dyn ByteSource,
) -> Result<u32, BridgeError> {
    let entries_per_sector = geometry.bytes_per_sector as u32 / 2;
    let mut free = 0;
    let mut cached: Option<(u32, Vec<u8>)> = None;

    for cluster in 2..=geometry.last_cluster() {
        let sector_index = cluster / entries_per_sector;
        let sector_number = geometry.reserved_sectors as u32 + sector_index;
        if cached.as_ref().map(|(n, _)| *n) != Some(sector_number) {
            cached = Some((
                sector_number,
                read_sector(source, geometry.bytes_per_sector, sector_number)?,
            ));
        }
        if let Some((_, sector)) = &cached {
            let offset = ((cluster % entries_per_sector) * 2) as usize;
            if LittleEndian::read_u16(&sector[offset..]) == cluster_values::FREE_CLUSTER {
                free += 1;
            }
        }
    }

    Ok(free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ImageBuilder;

    #[test]
    fn classifies_raw_values() {
        assert_eq!(FatEntry::from_raw(0x0000), FatEntry::Free);
        assert_eq!(FatEntry::from_raw(0x0001), FatEntry::Reserved);
        assert_eq!(FatEntry::from_raw(0x0002), FatEntry::Next(2));
        assert_eq!(FatEntry::from_raw(0xFFEF), FatEntry::Next(0xFFEF));
        assert_eq!(FatEntry::from_raw(0xFFF0), FatEntry::Reserved);
        assert_eq!(FatEntry::from_raw(0xFFF6), FatEntry::Reserved);
        assert_eq!(FatEntry::from_raw(0xFFF7), FatEntry::Bad);
        assert_eq!(FatEntry::from_raw(0xFFF8), FatEntry::EndOfChain);
        assert_eq!(FatEntry::from_raw(0xFFFF), FatEntry::EndOfChain);
    }

    #[test]
    fn reads_entries_little_endian() {
        let mut builder = ImageBuilder::new();
        builder.set_fat(2, 3).set_fat(3, 0xFFFF).set_fat(7, 0x0102);
        let (geometry, source) = builder.mount();

        assert_eq!(fat_entry(2, &geometry, &source).unwrap(), 3);
        assert_eq!(fat_entry(3, &geometry, &source).unwrap(), 0xFFFF);
        assert_eq!(fat_entry(7, &geometry, &source).unwrap(), 0x0102);
    }

    #[test]
    fn entry_in_second_fat_sector() {
        // 300 * 2 bytes lands at offset 88 of the second FAT sector
        let mut builder = ImageBuilder::new().sectors_per_fat(2).total_clusters(400);
        builder.set_fat(300, 0xFFF8);
        let (geometry, source) = builder.mount();
        assert_eq!(fat_entry(300, &geometry, &source).unwrap(), 0xFFF8);
    }

    #[test]
    fn follows_links_and_stops_at_markers() {
        let mut builder = ImageBuilder::new();
        builder
            .set_fat(2, 5)
            .set_fat(5, 0xFFF8)
            .set_fat(6, 0xFFF7)
            .set_fat(7, 0x0000)
            .set_fat(8, 0xFFF2);
        let (geometry, source) = builder.mount();

        assert_eq!(next_cluster(2, &geometry, &source).unwrap(), Some(5));
        assert_eq!(next_cluster(5, &geometry, &source).unwrap(), None);
        assert_eq!(next_cluster(6, &geometry, &source).unwrap(), None);
        assert_eq!(next_cluster(7, &geometry, &source).unwrap(), None);
        assert_eq!(next_cluster(8, &geometry, &source).unwrap(), None);
    }

    #[test]
    fn link_outside_data_region_is_corrupt() {
        let mut builder = ImageBuilder::new();
        builder.set_fat(2, 0x1000);
        let (geometry, source) = builder.mount();
        assert!(matches!(
            next_cluster(2, &geometry, &source),
            Err(BridgeError::CorruptChain(_))
        ));
    }

    #[test]
    fn counts_free_clusters() {
        let mut builder = ImageBuilder::new();
        builder.set_fat(2, 0xFFFF).set_fat(3, 4).set_fat(4, 0xFFFF);
        let (geometry, source) = builder.mount();
        assert_eq!(count_free_clusters(&geometry, &source).unwrap(), 64 - 3);
    }
}
