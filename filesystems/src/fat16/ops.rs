// FAT16 FilesystemOps implementation for mounting
use super::directory::DirEntry;
use super::path_resolver::Resolved;
use super::reader::Fat16Volume;
use crate::ops::{DirectoryEntry, FileAttributes, FilesystemInfo, FilesystemOps};
use fatbridge_core::{BridgeError, Device};
use log::{debug, info};
use std::path::Path;

/// Longest 8.3 display name: eight characters, a dot and three more.
const MAX_SHORT_NAME_LEN: u32 = 12;

/// FAT16 filesystem operations wrapper
#[derive(Debug, Default)]
pub struct Fat16Ops {
    volume: Option<Fat16Volume>,
    device: Option<Device>,
}

impl Fat16Ops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already mounted volume.
    pub fn with_volume(volume: Fat16Volume) -> Self {
        Fat16Ops { volume: Some(volume), device: None }
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    fn volume(&self) -> Result<&Fat16Volume, BridgeError> {
        self.volume
            .as_ref()
            .ok_or_else(|| BridgeError::Configuration("Filesystem not initialized".to_string()))
    }

    fn root_attributes(&self, volume: &Fat16Volume) -> FileAttributes {
        FileAttributes {
            size: 0,
            is_directory: true,
            is_file: false,
            created: None,
            modified: None,
            accessed: None,
            permissions: 0o755,
            owner: None,
            group: None,
            block_size: volume.geometry().bytes_per_cluster(),
            blocks: 0,
        }
    }
}

fn path_str(path: &Path) -> Result<&str, BridgeError> {
    path.to_str()
        .ok_or_else(|| BridgeError::InvalidPathSegment(format!("{} is not UTF-8", path.display())))
}

/// Host attributes for a directory entry.
pub fn entry_attributes(entry: &DirEntry, cluster_size: u32) -> FileAttributes {
    let is_directory = entry.is_directory();
    let size = if is_directory { 0 } else { entry.file_size as u64 };

    FileAttributes {
        size,
        is_directory,
        is_file: !is_directory,
        created: entry.created(),
        modified: entry.modified(),
        accessed: entry.accessed(),
        permissions: if is_directory { 0o755 } else { 0o644 },
        owner: None,
        group: None,
        block_size: cluster_size,
        blocks: size.div_ceil(cluster_size.max(1) as u64),
    }
}

impl FilesystemOps for Fat16Ops {
    fn filesystem_type(&self) -> &str {
        "fat16"
    }

    fn init(&mut self, device: &Device) -> Result<(), BridgeError> {
        info!("Initializing FAT16 operations for {} ({})", device.name, device.id);
        let volume = Fat16Volume::open(Path::new(&device.id))?;

        self.volume = Some(volume);
        self.device = Some(device.clone());
        Ok(())
    }

    fn statfs(&self) -> Result<FilesystemInfo, BridgeError> {
        let volume = self.volume()?;
        let info = volume.info()?;
        let free_space = info.free_clusters as u64 * info.cluster_size as u64;

        Ok(FilesystemInfo {
            total_space: info.total_bytes,
            free_space,
            available_space: free_space,
            total_inodes: 0,
            free_inodes: 0,
            block_size: info.cluster_size,
            fragment_size: volume.geometry().bytes_per_sector as u32,
            max_filename_length: MAX_SHORT_NAME_LEN,
            filesystem_type: info.fs_type,
            volume_label: info.label,
            volume_uuid: Some(format!("{:04X}-{:04X}", info.volume_id >> 16, info.volume_id & 0xFFFF)),
            is_readonly: true,
        })
    }

    fn stat(&self, path: &Path) -> Result<FileAttributes, BridgeError> {
        let volume = self.volume()?;
        let path = path_str(path)?;

        match volume.lookup(path)? {
            Resolved::Root => Ok(self.root_attributes(volume)),
            Resolved::Entry(located) => {
                Ok(entry_attributes(&located.entry, volume.geometry().bytes_per_cluster()))
            }
        }
    }

    fn readdir(&self, path: &Path) -> Result<Vec<DirectoryEntry>, BridgeError> {
        let volume = self.volume()?;
        let path = path_str(path)?;
        let location = volume.directory_at(path)?;
        let cluster_size = volume.geometry().bytes_per_cluster();

        let entries: Vec<DirectoryEntry> = volume
            .list_directory(location)?
            .into_iter()
            .filter(|(_, entry)| !entry.name.is_dot() && !entry.name.is_dot_dot())
            .map(|(name, entry)| DirectoryEntry {
                name,
                attributes: entry_attributes(&entry, cluster_size),
            })
            .collect();

        debug!("readdir {} ({:?}): {} entries", path, location, entries.len());
        Ok(entries)
    }

    fn read(&self, path: &Path, offset: u64, size: u32) -> Result<Vec<u8>, BridgeError> {
        let volume = self.volume()?;
        let path = path_str(path)?;

        match volume.lookup(path)? {
            Resolved::Entry(located) if !located.entry.is_directory() => {
                volume.read_file_range(&located.entry, offset, size as u64)
            }
            _ => Err(BridgeError::IsADirectory(path.to_string())),
        }
    }
}
