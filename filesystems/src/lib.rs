// Read-only FAT16 volume engine and its mount bridge
pub mod device_reader;
pub mod fat16;
pub mod mount;
pub mod ops;

#[cfg(test)]
pub mod test_helpers;

pub use device_reader::{open_image, ByteSource, MemoryImage};
pub use fat16::{Fat16Ops, Fat16Volume, Resolution, Resolved, VolumeInfo};
pub use mount::{mount, InodeTable, MountOptions};
pub use ops::{DirectoryEntry, FileAttributes, FilesystemInfo, FilesystemOps};
