// Test helpers: in-memory FAT16 images

use crate::device_reader::MemoryImage;
use crate::fat16::boot_sector::{derive_geometry, VolumeGeometry, BOOT_SECTOR_SIZE};
use crate::fat16::directory::{FatAttributes, DIR_ENTRY_SIZE};
use crate::fat16::Fat16Volume;
use std::sync::Arc;

const END_OF_CHAIN: u16 = 0xFFFF;

/// Packed write date/time stamped on every test entry: 2015-06-21 13:45:30.
pub const TEST_WRITE_DATE: u16 = (35 << 9) | (6 << 5) | 21;
pub const TEST_WRITE_TIME: u16 = (13 << 11) | (45 << 5) | 15;
pub const TEST_WRITE_UNIX: u64 = 1_434_894_330;

/// Build a raw 32-byte directory record.
pub fn raw_entry(name: &[u8; 11], attributes: u8, cluster: u16, size: u32) -> [u8; 32] {
    let mut raw = [0u8; DIR_ENTRY_SIZE];
    raw[..11].copy_from_slice(name);
    raw[11] = attributes;
    raw[14..16].copy_from_slice(&TEST_WRITE_TIME.to_le_bytes());
    raw[16..18].copy_from_slice(&TEST_WRITE_DATE.to_le_bytes());
    raw[18..20].copy_from_slice(&TEST_WRITE_DATE.to_le_bytes());
    raw[22..24].copy_from_slice(&TEST_WRITE_TIME.to_le_bytes());
    raw[24..26].copy_from_slice(&TEST_WRITE_DATE.to_le_bytes());
    raw[26..28].copy_from_slice(&cluster.to_le_bytes());
    raw[28..32].copy_from_slice(&size.to_le_bytes());
    raw
}

/// Describes a small FAT16 image and renders it into memory.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    num_fats: u8,
    root_entries: u16,
    sectors_per_fat: u16,
    total_clusters: u32,
    fat: Vec<(u16, u16)>,
    root: Vec<(usize, [u8; 32])>,
    dir: Vec<(u16, usize, [u8; 32])>,
    clusters: Vec<(u16, Vec<u8>)>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 1,
            num_fats: 2,
            root_entries: 32,
            sectors_per_fat: 1,
            total_clusters: 64,
            fat: Vec::new(),
            root: Vec::new(),
            dir: Vec::new(),
            clusters: Vec::new(),
        }
    }

    pub fn bytes_per_sector(mut self, value: u16) -> Self {
        self.bytes_per_sector = value;
        self
    }

    pub fn sectors_per_cluster(mut self, value: u8) -> Self {
        self.sectors_per_cluster = value;
        self
    }

    pub fn root_entries(mut self, value: u16) -> Self {
        self.root_entries = value;
        self
    }

    pub fn sectors_per_fat(mut self, value: u16) -> Self {
        self.sectors_per_fat = value;
        self
    }

    pub fn total_clusters(mut self, value: u32) -> Self {
        self.total_clusters = value;
        self
    }

    pub fn set_fat(&mut self, cluster: u16, value: u16) -> &mut Self {
        self.fat.push((cluster, value));
        self
    }

    /// Link `clusters` in order and terminate the chain.
    pub fn chain(&mut self, clusters: &[u16]) -> &mut Self {
        for pair in clusters.windows(2) {
            self.set_fat(pair[0], pair[1]);
        }
        if let Some(&last) = clusters.last() {
            self.set_fat(last, END_OF_CHAIN);
        }
        self
    }

    pub fn root_entry(&mut self, slot: usize, raw: [u8; 32]) -> &mut Self {
        self.root.push((slot, raw));
        self
    }

    /// Place a record at `slot` of the directory data starting at `cluster`.
    pub fn dir_entry(&mut self, cluster: u16, slot: usize, raw: [u8; 32]) -> &mut Self {
        self.dir.push((cluster, slot, raw));
        self
    }

    pub fn write_cluster(&mut self, cluster: u16, data: &[u8]) -> &mut Self {
        self.clusters.push((cluster, data.to_vec()));
        self
    }

    /// Chain `clusters` and spread `data` over them.
    pub fn write_file(&mut self, clusters: &[u16], data: &[u8]) -> &mut Self {
        let cluster_bytes = self.bytes_per_sector as usize * self.sectors_per_cluster as usize;
        self.chain(clusters);
        for (&cluster, chunk) in clusters.iter().zip(data.chunks(cluster_bytes)) {
            self.write_cluster(cluster, chunk);
        }
        self
    }

    fn root_dir_sectors(&self) -> u32 {
        let bps = self.bytes_per_sector as u32;
        (self.root_entries as u32 * DIR_ENTRY_SIZE as u32 + bps - 1) / bps
    }

    fn first_data_sector(&self) -> u32 {
        self.reserved_sectors as u32
            + self.num_fats as u32 * self.sectors_per_fat as u32
            + self.root_dir_sectors()
    }

    fn cluster_offset(&self, cluster: u16) -> usize {
        let sector = (cluster as u32 - 2) * self.sectors_per_cluster as u32 + self.first_data_sector();
        sector as usize * self.bytes_per_sector as usize
    }

    pub fn build(&self) -> MemoryImage {
        let bps = self.bytes_per_sector as usize;
        let total_sectors =
            self.first_data_sector() + self.total_clusters * self.sectors_per_cluster as u32;
        let mut image = vec![0u8; (total_sectors as usize * bps).max(BOOT_SECTOR_SIZE)];

        let boot = &mut image[..BOOT_SECTOR_SIZE];
        boot[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
        boot[3..11].copy_from_slice(b"MSWIN4.1");
        boot[11..13].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        boot[13] = self.sectors_per_cluster;
        boot[14..16].copy_from_slice(&self.reserved_sectors.to_le_bytes());
        boot[16] = self.num_fats;
        boot[17..19].copy_from_slice(&self.root_entries.to_le_bytes());
        if total_sectors < 0x10000 {
            boot[19..21].copy_from_slice(&(total_sectors as u16).to_le_bytes());
        } else {
            boot[32..36].copy_from_slice(&total_sectors.to_le_bytes());
        }
        boot[21] = 0xF8;
        boot[22..24].copy_from_slice(&self.sectors_per_fat.to_le_bytes());
        boot[36] = 0x80;
        boot[38] = 0x29;
        boot[39..43].copy_from_slice(&0x1234_ABCDu32.to_le_bytes());
        boot[43..54].copy_from_slice(b"TESTVOL    ");
        boot[54..62].copy_from_slice(b"FAT16   ");
        boot[510..512].copy_from_slice(&0xAA55u16.to_le_bytes());

        let fat_bytes = self.sectors_per_fat as usize * bps;
        let mut fat_entries = vec![(0u16, 0xFFF8u16), (1, 0xFFFF)];
        fat_entries.extend(self.fat.iter().copied());
        for copy in 0..self.num_fats as usize {
            let fat_start = (self.reserved_sectors as usize) * bps + copy * fat_bytes;
            for &(cluster, value) in &fat_entries {
                let at = fat_start + cluster as usize * 2;
                image[at..at + 2].copy_from_slice(&value.to_le_bytes());
            }
        }

        let root_start =
            (self.reserved_sectors as usize + self.num_fats as usize * self.sectors_per_fat as usize)
                * bps;
        for (slot, raw) in &self.root {
            let at = root_start + slot * DIR_ENTRY_SIZE;
            image[at..at + DIR_ENTRY_SIZE].copy_from_slice(raw);
        }

        for (cluster, data) in &self.clusters {
            let at = self.cluster_offset(*cluster);
            image[at..at + data.len()].copy_from_slice(data);
        }

        for (cluster, slot, raw) in &self.dir {
            let at = self.cluster_offset(*cluster) + slot * DIR_ENTRY_SIZE;
            image[at..at + DIR_ENTRY_SIZE].copy_from_slice(raw);
        }

        MemoryImage::new(image)
    }

    pub fn mount(&self) -> (VolumeGeometry, MemoryImage) {
        let image = self.build();
        let boot = image.clone().into_inner();
        let geometry = derive_geometry(&boot[..BOOT_SECTOR_SIZE]).expect("test boot sector");
        (geometry, image)
    }

    pub fn volume(&self) -> Fat16Volume {
        init_test_logging();
        Fat16Volume::mount(Arc::new(self.build())).expect("test volume")
    }
}

/// Route `log` output through the test harness; set RUST_LOG to see it.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Contents of `/big.bin` in the sample volume.
pub fn big_bin_contents() -> Vec<u8> {
    (0..1300u32).map(|i| (i % 251) as u8).collect()
}

pub const HELLO_CONTENTS: &[u8] = b"Hello, FAT16!";
pub const NOTES_CONTENTS: &[u8] = b"notes\n";
pub const DEEP_CONTENTS: &[u8] = b"deep!";

/// A volume with a small tree:
///
/// ```text
/// /hello.txt            cluster 2
/// /docs/                clusters 3 -> 4 (16 entries in the first cluster)
/// /docs/item00..item13  empty files
/// /docs/notes.txt       cluster 8
/// /docs/sub/            cluster 7
/// /docs/sub/deep.txt    cluster 10
/// /big.bin              clusters 5 -> 6 -> 9, 1300 bytes
/// /empty.txt            no clusters
/// ```
pub fn sample_builder() -> ImageBuilder {
    let mut b = ImageBuilder::new();
    let dir = FatAttributes::DIRECTORY;
    let file = FatAttributes::ARCHIVE;

    b.root_entry(0, raw_entry(b"TESTVOL    ", FatAttributes::VOLUME_ID, 0, 0))
        .root_entry(1, raw_entry(b"HELLO   TXT", file, 2, HELLO_CONTENTS.len() as u32))
        .root_entry(2, raw_entry(b"\xE5ONE    TXT", file, 11, 4))
        .root_entry(3, raw_entry(b"DOCS       ", dir, 3, 0))
        .root_entry(4, raw_entry(b"BIG     BIN", file, 5, 1300))
        .root_entry(5, raw_entry(b"EMPTY   TXT", file, 0, 0));

    b.write_file(&[2], HELLO_CONTENTS);
    b.write_file(&[5, 6, 9], &big_bin_contents());

    b.chain(&[3, 4])
        .dir_entry(3, 0, raw_entry(b".          ", dir, 3, 0))
        .dir_entry(3, 1, raw_entry(b"..         ", dir, 0, 0));
    for i in 0..14 {
        let mut name = *b"ITEM00     ";
        name[4] = b'0' + (i / 10) as u8;
        name[5] = b'0' + (i % 10) as u8;
        b.dir_entry(3, i + 2, raw_entry(&name, file, 0, 0));
    }
    b.dir_entry(4, 0, raw_entry(b"NOTES   TXT", file, 8, NOTES_CONTENTS.len() as u32))
        .dir_entry(4, 1, raw_entry(b"SUB        ", dir, 7, 0));
    b.write_file(&[8], NOTES_CONTENTS);

    b.chain(&[7])
        .dir_entry(7, 0, raw_entry(b".          ", dir, 7, 0))
        .dir_entry(7, 1, raw_entry(b"..         ", dir, 3, 0))
        .dir_entry(7, 2, raw_entry(b"DEEP    TXT", file, 10, DEEP_CONTENTS.len() as u32));
    b.write_file(&[10], DEEP_CONTENTS);

    b
}

pub fn sample_volume() -> Fat16Volume {
    sample_builder().volume()
}

/// Raw name `<prefix><n>` padded to 8, followed by `ext`.
pub fn numbered_name(prefix: char, n: usize, ext: &[u8; 3]) -> [u8; 11] {
    let mut raw = [b' '; 11];
    let base = format!("{}{}", prefix, n);
    raw[..base.len()].copy_from_slice(base.as_bytes());
    raw[8..].copy_from_slice(ext);
    raw
}

pub const LAST_CONTENTS: &[u8] = b"last!";

/// A volume with 1024-byte sectors, one sector per cluster:
///
/// ```text
/// /r0.bin../r38.bin     root slots 0-38, spanning both root sectors
/// /dir/                 root slot 39, clusters 3 -> 5
/// /dir/d2../dir/d31     empty files filling the rest of cluster 3
/// /dir/last.txt         first slot of cluster 5, data in cluster 6
/// ```
pub fn wide_sector_builder() -> ImageBuilder {
    let mut b = ImageBuilder::new().bytes_per_sector(1024).root_entries(64);
    let dir = FatAttributes::DIRECTORY;
    let file = FatAttributes::ARCHIVE;

    for i in 0..39 {
        b.root_entry(i, raw_entry(&numbered_name('R', i, b"BIN"), file, 0, 0));
    }
    b.root_entry(39, raw_entry(b"DIR        ", dir, 3, 0));

    b.chain(&[3, 5])
        .dir_entry(3, 0, raw_entry(b".          ", dir, 3, 0))
        .dir_entry(3, 1, raw_entry(b"..         ", dir, 0, 0));
    for i in 2..32 {
        b.dir_entry(3, i, raw_entry(&numbered_name('D', i, b"   "), file, 0, 0));
    }
    b.dir_entry(5, 0, raw_entry(b"LAST    TXT", file, 6, LAST_CONTENTS.len() as u32));
    b.write_file(&[6], LAST_CONTENTS);

    b
}
