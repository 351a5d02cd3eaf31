// Filesystem operations trait
// The interface the mount bridge drives. Lookups take `&self` so one
// implementation can serve concurrent host calls without a lock.

use fatbridge_core::{BridgeError, Device};
use std::path::Path;

/// File attributes returned by stat operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    pub size: u64,
    pub is_directory: bool,
    pub is_file: bool,
    pub created: Option<u64>,      // Unix timestamp
    pub modified: Option<u64>,     // Unix timestamp
    pub accessed: Option<u64>,     // Unix timestamp
    pub permissions: u32,          // Unix-style permissions
    pub owner: Option<u32>,        // UID
    pub group: Option<u32>,        // GID
    /// Allocation unit, the cluster size on FAT volumes.
    pub block_size: u32,
    /// Allocation units covering `size`.
    pub blocks: u64,
}

/// Directory entry returned by readdir operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub attributes: FileAttributes,
}

/// Filesystem information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemInfo {
    pub total_space: u64,
    pub free_space: u64,
    pub available_space: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
    pub block_size: u32,
    pub fragment_size: u32,
    pub max_filename_length: u32,
    pub filesystem_type: String,
    pub volume_label: Option<String>,
    pub volume_uuid: Option<String>,
    pub is_readonly: bool,
}

/// Core filesystem operations trait
/// All operations are synchronous to match FUSE requirements
pub trait FilesystemOps: Send + Sync {
    /// Initialize the filesystem for a device
    fn init(&mut self, device: &Device) -> Result<(), BridgeError>;

    /// Get filesystem information
    fn statfs(&self) -> Result<FilesystemInfo, BridgeError>;

    /// Get file/directory attributes
    fn stat(&self, path: &Path) -> Result<FileAttributes, BridgeError>;

    /// List directory contents, without `.` and `..`
    fn readdir(&self, path: &Path) -> Result<Vec<DirectoryEntry>, BridgeError>;

    /// Read file contents
    fn read(&self, path: &Path, offset: u64, size: u32) -> Result<Vec<u8>, BridgeError>;

    fn write(&self, _path: &Path, _offset: u64, _data: &[u8]) -> Result<u32, BridgeError> {
        Err(BridgeError::NotSupported("Filesystem is read-only".to_string()))
    }

    fn create(&self, _path: &Path, _mode: u32) -> Result<(), BridgeError> {
        Err(BridgeError::NotSupported("Filesystem is read-only".to_string()))
    }

    fn mkdir(&self, _path: &Path, _mode: u32) -> Result<(), BridgeError> {
        Err(BridgeError::NotSupported("Filesystem is read-only".to_string()))
    }

    fn unlink(&self, _path: &Path) -> Result<(), BridgeError> {
        Err(BridgeError::NotSupported("Filesystem is read-only".to_string()))
    }

    fn rmdir(&self, _path: &Path) -> Result<(), BridgeError> {
        Err(BridgeError::NotSupported("Filesystem is read-only".to_string()))
    }

    fn rename(&self, _from: &Path, _to: &Path) -> Result<(), BridgeError> {
        Err(BridgeError::NotSupported("Filesystem is read-only".to_string()))
    }

    /// Check if filesystem supports writes
    fn is_readonly(&self) -> bool {
        true
    }

    /// Get filesystem type name (e.g., "fat16")
    fn filesystem_type(&self) -> &str;
}
