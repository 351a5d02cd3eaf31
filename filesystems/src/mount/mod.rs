// Filesystem mounting support for the FAT16 bridge
// Exposes a FilesystemOps implementation through FUSE.

#[cfg(all(unix, feature = "mount-unix"))]
pub mod fuse;

use crate::ops::FilesystemOps;
use fatbridge_core::{BridgeError, Device};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mount options for filesystem mounting. The mount is always read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MountOptions {
    pub mount_point: String,
    /// Source name shown in the host's mount table.
    pub fs_name: String,
    pub allow_other: bool,
    pub auto_unmount: bool,
    /// Owner reported for every entry; the mounting user when unset.
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// How long the host may cache attributes and lookups.
    pub attr_ttl_secs: u64,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            mount_point: String::new(),
            fs_name: "fatbridge".to_string(),
            allow_other: false,
            auto_unmount: false,
            uid: None,
            gid: None,
            attr_ttl_secs: 1,
        }
    }
}

impl MountOptions {
    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path)?;
        let options = serde_json::from_str(&text)?;
        Ok(options)
    }

    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.attr_ttl_secs)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.mount_point.is_empty() {
            return Err(BridgeError::Configuration("no mount point given".to_string()));
        }
        let mount_point = Path::new(&self.mount_point);
        if !mount_point.is_dir() {
            return Err(BridgeError::Configuration(format!(
                "Mount point {} does not exist or is not a directory. Create it first with: mkdir -p {}",
                self.mount_point, self.mount_point
            )));
        }
        Ok(())
    }
}

/// Bidirectional map between FUSE inode numbers and volume paths.
///
/// FAT16 has no inode numbers, so they are handed out on first use. Paths
/// are keyed in lower case, matching the case-insensitive lookup, so every
/// spelling of a name shares one inode. An inode stays put until the host
/// forgets every lookup of it.
#[derive(Debug)]
pub struct InodeTable {
    next: u64,
    by_path: HashMap<PathBuf, u64>,
    by_inode: HashMap<u64, PathBuf>,
    lookups: HashMap<u64, u64>,
}

impl InodeTable {
    pub const ROOT_INODE: u64 = 1;

    pub fn new() -> Self {
        let root = PathBuf::from("/");
        let mut by_path = HashMap::new();
        let mut by_inode = HashMap::new();
        by_path.insert(root.clone(), Self::ROOT_INODE);
        by_inode.insert(Self::ROOT_INODE, root);

        Self { next: Self::ROOT_INODE + 1, by_path, by_inode, lookups: HashMap::new() }
    }

    /// Lower-case form of `path` used as the table key.
    pub fn canonical(path: &Path) -> PathBuf {
        PathBuf::from(path.to_string_lossy().to_ascii_lowercase())
    }

    /// Inode for `path`, allocating one if the path is new.
    pub fn inode_for(&mut self, path: &Path) -> u64 {
        let key = Self::canonical(path);
        if let Some(&ino) = self.by_path.get(&key) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.by_inode.insert(ino, key.clone());
        self.by_path.insert(key, ino);
        ino
    }

    /// Inode for `path`, counting one host lookup against it.
    pub fn remember(&mut self, path: &Path) -> u64 {
        let ino = self.inode_for(path);
        if ino != Self::ROOT_INODE {
            *self.lookups.entry(ino).or_insert(0) += 1;
        }
        ino
    }

    /// Drop `nlookup` host lookups of `ino`; the inode is released at zero.
    pub fn forget(&mut self, ino: u64, nlookup: u64) {
        let Some(count) = self.lookups.get_mut(&ino) else {
            return;
        };
        *count = count.saturating_sub(nlookup);
        if *count == 0 {
            self.lookups.remove(&ino);
            if let Some(path) = self.by_inode.remove(&ino) {
                self.by_path.remove(&path);
            }
        }
    }

    /// Canonical path of `ino`.
    pub fn path_of(&self, ino: u64) -> Option<&Path> {
        self.by_inode.get(&ino).map(PathBuf::as_path)
    }

    /// Inode of the directory containing `path`; the root is its own parent.
    pub fn parent_of(&mut self, path: &Path) -> u64 {
        match path.parent() {
            Some(parent) => self.inode_for(parent),
            None => Self::ROOT_INODE,
        }
    }

    pub fn len(&self) -> usize {
        self.by_inode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_inode.is_empty()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Host errno for a bridge error.
#[cfg(unix)]
pub fn errno_for(error: &BridgeError) -> nix::errno::Errno {
    use nix::errno::Errno;

    match error {
        BridgeError::NotFound(_) | BridgeError::InvalidPathSegment(_) => Errno::ENOENT,
        BridgeError::NotADirectory(_) => Errno::ENOTDIR,
        BridgeError::IsADirectory(_) => Errno::EISDIR,
        BridgeError::NotSupported(_) => Errno::EROFS,
        _ => Errno::EIO,
    }
}

/// Initialize `ops` for `device` and serve it at `options.mount_point`.
///
/// Runs in the foreground until the filesystem is unmounted.
pub fn mount(
    device: &Device,
    mut ops: Box<dyn FilesystemOps>,
    options: &MountOptions,
) -> Result<(), BridgeError> {
    options.validate()?;
    ops.init(device)?;
    info!(
        "Mounting {} ({}) read-only at {}",
        device.name,
        ops.filesystem_type(),
        options.mount_point
    );

    #[cfg(all(unix, feature = "mount-unix"))]
    {
        fuse::mount_foreground(ops, options)
    }

    #[cfg(not(all(unix, feature = "mount-unix")))]
    {
        Err(BridgeError::NotSupported(
            "FUSE support not compiled in. Build with --features mount-unix".to_string(),
        ))
    }
}
