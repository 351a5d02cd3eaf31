// FAT16 boot sector parsing and volume geometry

use super::directory::DIR_ENTRY_SIZE;
use byteorder::{ByteOrder, LittleEndian};
use fatbridge_core::BridgeError;
use log::{debug, warn};

/// Size of the on-disk boot sector record.
pub const BOOT_SECTOR_SIZE: usize = 512;

/// Boot signature expected in the last two bytes of the boot sector.
pub const BOOT_SIGNATURE: u16 = 0xAA55;

// Byte offsets of the BPB fields used by the driver.
mod offsets {
    pub const OEM_NAME: usize = 0x03;
    pub const BYTES_PER_SECTOR: usize = 0x0B;
    pub const SECTORS_PER_CLUSTER: usize = 0x0D;
    pub const RESERVED_SECTORS: usize = 0x0E;
    pub const NUM_FATS: usize = 0x10;
    pub const ROOT_ENTRIES: usize = 0x11;
    pub const TOTAL_SECTORS_16: usize = 0x13;
    pub const MEDIA_DESCRIPTOR: usize = 0x15;
    pub const SECTORS_PER_FAT: usize = 0x16;
    pub const TOTAL_SECTORS_32: usize = 0x20;
    pub const VOLUME_ID: usize = 0x27;
    pub const VOLUME_LABEL: usize = 0x2B;
    pub const FS_TYPE: usize = 0x36;
    pub const SIGNATURE: usize = 0x1FE;
}

/// Layout of a mounted FAT16 volume, derived once from its boot sector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entries: u16,
    pub sectors_per_fat: u16,
    pub total_sectors: u32,
    pub media_descriptor: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
    pub signature: u16,

    /// Reserved sectors plus all FAT copies.
    pub first_root_sector: u32,
    /// Sectors occupied by the fixed root directory table.
    pub root_dir_sectors: u32,
    /// First sector of cluster #2.
    pub first_data_sector: u32,
    /// Number of data clusters on the volume.
    pub total_clusters: u32,
}

impl VolumeGeometry {
    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    /// Number of 32-byte directory records in one sector.
    pub fn entries_per_sector(&self) -> usize {
        self.bytes_per_sector as usize / DIR_ENTRY_SIZE
    }

    /// First sector of a data cluster. Clusters below 2 have no data sectors.
    pub fn cluster_to_sector(&self, cluster: u16) -> u32 {
        debug_assert!(cluster >= 2);
        (cluster as u32 - 2) * self.sectors_per_cluster as u32 + self.first_data_sector
    }

    /// Highest cluster number that addresses the data region.
    pub fn last_cluster(&self) -> u32 {
        self.total_clusters + 1
    }

    pub fn is_data_cluster(&self, cluster: u16) -> bool {
        cluster >= 2 && (cluster as u32) <= self.last_cluster()
    }

    /// Upper bound on the number of clusters any chain may visit.
    /// Longer chains can only come from a cycle in the FAT.
    pub fn max_chain_length(&self) -> u32 {
        self.total_clusters.max(1)
    }

    pub fn label(&self) -> Option<String> {
        let label = String::from_utf8_lossy(&self.volume_label).trim_end().to_string();
        if label.is_empty() || label == "NO NAME" {
            None
        } else {
            Some(label)
        }
    }

    pub fn fs_type(&self) -> String {
        String::from_utf8_lossy(&self.fs_type).trim_end().to_string()
    }

    pub fn oem_name(&self) -> String {
        String::from_utf8_lossy(&self.oem_name).trim_end().to_string()
    }
}

/// Parse a boot sector into the volume geometry.
pub fn derive_geometry(boot: &[u8]) -> Result<VolumeGeometry, BridgeError> {
    if boot.len() < BOOT_SECTOR_SIZE {
        return Err(BridgeError::MalformedBootSector(format!(
            "boot sector is {} bytes, expected {}",
            boot.len(),
            BOOT_SECTOR_SIZE
        )));
    }

    let bytes_per_sector = LittleEndian::read_u16(&boot[offsets::BYTES_PER_SECTOR..]);
    let sectors_per_cluster = boot[offsets::SECTORS_PER_CLUSTER];
    let reserved_sectors = LittleEndian::read_u16(&boot[offsets::RESERVED_SECTORS..]);
    let num_fats = boot[offsets::NUM_FATS];
    let root_entries = LittleEndian::read_u16(&boot[offsets::ROOT_ENTRIES..]);
    let total_sectors_16 = LittleEndian::read_u16(&boot[offsets::TOTAL_SECTORS_16..]);
    let media_descriptor = boot[offsets::MEDIA_DESCRIPTOR];
    let sectors_per_fat = LittleEndian::read_u16(&boot[offsets::SECTORS_PER_FAT..]);
    let total_sectors_32 = LittleEndian::read_u32(&boot[offsets::TOTAL_SECTORS_32..]);
    let volume_id = LittleEndian::read_u32(&boot[offsets::VOLUME_ID..]);
    let signature = LittleEndian::read_u16(&boot[offsets::SIGNATURE..]);

    let mut oem_name = [0u8; 8];
    oem_name.copy_from_slice(&boot[offsets::OEM_NAME..offsets::OEM_NAME + 8]);
    let mut volume_label = [0u8; 11];
    volume_label.copy_from_slice(&boot[offsets::VOLUME_LABEL..offsets::VOLUME_LABEL + 11]);
    let mut fs_type = [0u8; 8];
    fs_type.copy_from_slice(&boot[offsets::FS_TYPE..offsets::FS_TYPE + 8]);

    if bytes_per_sector == 0 {
        return Err(BridgeError::MalformedBootSector("bytes per sector is zero".to_string()));
    }
    if !bytes_per_sector.is_power_of_two() || (bytes_per_sector as usize) < DIR_ENTRY_SIZE {
        return Err(BridgeError::MalformedBootSector(format!(
            "invalid bytes per sector: {}",
            bytes_per_sector
        )));
    }
    if sectors_per_cluster == 0 {
        return Err(BridgeError::MalformedBootSector("sectors per cluster is zero".to_string()));
    }
    if num_fats == 0 {
        return Err(BridgeError::MalformedBootSector("number of FATs is zero".to_string()));
    }
    if sectors_per_fat == 0 || root_entries == 0 {
        return Err(BridgeError::MalformedBootSector(
            "no FAT16 FAT size or root directory (FAT32 layout?)".to_string(),
        ));
    }

    if signature != BOOT_SIGNATURE {
        warn!("Boot sector signature is {:#06x}, expected {:#06x}", signature, BOOT_SIGNATURE);
    }
    if !fs_type.starts_with(b"FAT16") {
        warn!(
            "Filesystem type string is {:?}, mounting as FAT16 anyway",
            String::from_utf8_lossy(&fs_type)
        );
    }

    let bps = bytes_per_sector as u32;
    let first_root_sector = reserved_sectors as u32 + num_fats as u32 * sectors_per_fat as u32;
    let root_dir_sectors = (root_entries as u32 * DIR_ENTRY_SIZE as u32 + bps - 1) / bps;
    let first_data_sector = first_root_sector + root_dir_sectors;

    let total_sectors = if total_sectors_16 != 0 {
        total_sectors_16 as u32
    } else {
        total_sectors_32
    };

    // A FAT16 table cannot address more than 0xFFF6 data clusters.
    let fat_capacity = (sectors_per_fat as u32 * bps / 2).saturating_sub(2).min(0xFFF6 - 1);
    let total_clusters = if total_sectors > first_data_sector {
        ((total_sectors - first_data_sector) / sectors_per_cluster as u32).min(fat_capacity)
    } else {
        warn!(
            "Total sector count {} does not reach the data region at {}, sizing from the FAT",
            total_sectors, first_data_sector
        );
        fat_capacity
    };

    let geometry = VolumeGeometry {
        oem_name,
        bytes_per_sector,
        sectors_per_cluster,
        reserved_sectors,
        num_fats,
        root_entries,
        sectors_per_fat,
        total_sectors,
        media_descriptor,
        volume_id,
        volume_label,
        fs_type,
        signature,
        first_root_sector,
        root_dir_sectors,
        first_data_sector,
        total_clusters,
    };

    debug!(
        "FAT16 geometry: root at sector {}, {} root sectors, data at sector {}, {} clusters",
        geometry.first_root_sector,
        geometry.root_dir_sectors,
        geometry.first_data_sector,
        geometry.total_clusters
    );

    Ok(geometry)
}
