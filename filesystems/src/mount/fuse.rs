// FUSE filesystem implementation for Linux/macOS
// This bridges FilesystemOps to the FUSE API using the fuser crate

use super::{errno_for, InodeTable, MountOptions};
use crate::ops::{FileAttributes, FilesystemOps};
use fatbridge_core::BridgeError;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
};
use log::{debug, error, info, warn};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

/// Convert FileAttributes to FUSE FileAttr
fn convert_to_fuse_attr(attrs: &FileAttributes, ino: u64, uid: u32, gid: u32) -> FileAttr {
    let kind = if attrs.is_directory { FileType::Directory } else { FileType::RegularFile };
    let time = |t: Option<u64>| t.map(|t| UNIX_EPOCH + Duration::from_secs(t)).unwrap_or(UNIX_EPOCH);
    let mtime = time(attrs.modified);
    let crtime = time(attrs.created);

    FileAttr {
        ino,
        size: attrs.size,
        // st_blocks counts 512-byte units of allocated space
        blocks: attrs.blocks * attrs.block_size as u64 / 512,
        atime: time(attrs.accessed),
        mtime,
        ctime: mtime,
        crtime,
        kind,
        perm: attrs.permissions as u16,
        nlink: if attrs.is_directory { 2 } else { 1 },
        uid: attrs.owner.unwrap_or(uid),
        gid: attrs.group.unwrap_or(gid),
        rdev: 0,
        blksize: attrs.block_size,
        flags: 0,
    }
}

fn errno(error: &BridgeError) -> i32 {
    errno_for(error) as i32
}

/// Outcome of a mutating call on a read-only filesystem.
fn rejected<T>(result: Result<T, BridgeError>) -> i32 {
    match result {
        Err(e) => errno(&e),
        Ok(_) => libc::EROFS,
    }
}

struct FatBridgeFuse {
    ops: Box<dyn FilesystemOps>,
    inodes: InodeTable,
    uid: u32,
    gid: u32,
    ttl: Duration,
}

impl FatBridgeFuse {
    fn new(ops: Box<dyn FilesystemOps>, options: &MountOptions) -> Self {
        Self {
            ops,
            inodes: InodeTable::new(),
            uid: options.uid.unwrap_or_else(|| nix::unistd::getuid().as_raw()),
            gid: options.gid.unwrap_or_else(|| nix::unistd::getgid().as_raw()),
            ttl: options.attr_ttl(),
        }
    }

    fn path_of(&self, ino: u64) -> Result<PathBuf, i32> {
        self.inodes.path_of(ino).map(Path::to_path_buf).ok_or(libc::ENOENT)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<PathBuf, i32> {
        Ok(self.path_of(parent)?.join(name))
    }
}

impl Filesystem for FatBridgeFuse {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = match self.child_path(parent, name) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.ops.stat(&path) {
            Ok(attrs) => {
                let ino = self.inodes.remember(&path);
                let attr = convert_to_fuse_attr(&attrs, ino, self.uid, self.gid);
                reply.entry(&self.ttl, &attr, 0);
            }
            Err(e) => {
                debug!("lookup {:?}: {}", path, e);
                reply.error(errno(&e));
            }
        }
    }

    fn forget(&mut self, _req: &Request, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.ops.stat(&path) {
            Ok(attrs) => {
                let attr = convert_to_fuse_attr(&attrs, ino, self.uid, self.gid);
                reply.attr(&self.ttl, &attr);
            }
            Err(e) => {
                error!("Failed to stat {:?}: {}", path, e);
                reply.error(errno(&e));
            }
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return reply.error(libc::EROFS);
        }
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        match self.ops.stat(&path) {
            Ok(attrs) if attrs.is_directory => reply.error(libc::EISDIR),
            Ok(_) => reply.opened(0, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        if offset < 0 {
            return reply.error(libc::EINVAL);
        }

        match self.ops.read(&path, offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(e) => {
                error!("Failed to read {:?}: {}", path, e);
                reply.error(errno(&e));
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };

        let entries = match self.ops.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to readdir {:?}: {}", path, e);
                return reply.error(errno(&e));
            }
        };

        let parent_ino = self.inodes.parent_of(&path);
        let mut listing = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent_ino, FileType::Directory, "..".to_string()),
        ];
        for entry in entries {
            let entry_ino = self.inodes.inode_for(&path.join(&entry.name));
            let kind = if entry.attributes.is_directory {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            listing.push((entry_ino, kind, entry.name));
        }

        for (idx, (entry_ino, kind, name)) in listing.into_iter().enumerate().skip(offset.max(0) as usize) {
            // The offset handed back is where the next call resumes.
            if reply.add(entry_ino, idx as i64 + 1, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        match self.ops.statfs() {
            Ok(info) => {
                let block_size = info.block_size.max(1) as u64;
                reply.statfs(
                    info.total_space / block_size,
                    info.free_space / block_size,
                    info.available_space / block_size,
                    info.total_inodes,
                    info.free_inodes,
                    info.block_size,
                    info.max_filename_length,
                    info.fragment_size,
                );
            }
            Err(e) => {
                error!("Failed to statfs: {}", e);
                reply.error(errno(&e));
            }
        }
    }

    // Write operations - all rejected, the bridge is read-only
    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        reply.error(rejected(self.ops.write(&path, offset.max(0) as u64, data)));
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        match self.child_path(parent, name) {
            Ok(path) => reply.error(rejected(self.ops.create(&path, mode))),
            Err(e) => reply.error(e),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        match self.child_path(parent, name) {
            Ok(path) => reply.error(rejected(self.ops.mkdir(&path, mode))),
            Err(e) => reply.error(e),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.child_path(parent, name) {
            Ok(path) => reply.error(rejected(self.ops.unlink(&path))),
            Err(e) => reply.error(e),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.child_path(parent, name) {
            Ok(path) => reply.error(rejected(self.ops.rmdir(&path))),
            Err(e) => reply.error(e),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let paths = self
            .child_path(parent, name)
            .and_then(|from| Ok((from, self.child_path(newparent, newname)?)));
        match paths {
            Ok((from, to)) => reply.error(rejected(self.ops.rename(&from, &to))),
            Err(e) => reply.error(e),
        }
    }
}

/// Serve `ops` at the mount point until it is unmounted.
pub fn mount_foreground(
    ops: Box<dyn FilesystemOps>,
    options: &MountOptions,
) -> Result<(), BridgeError> {
    let mut mount_options = vec![
        MountOption::FSName(options.fs_name.clone()),
        MountOption::Subtype(ops.filesystem_type().to_string()),
        MountOption::RO,
        MountOption::DefaultPermissions,
    ];
    if options.allow_other {
        mount_options.push(MountOption::AllowOther);
    }
    if options.auto_unmount {
        if !options.allow_other {
            warn!("auto_unmount without allow_other needs user_allow_other in /etc/fuse.conf");
        }
        mount_options.push(MountOption::AutoUnmount);
    }

    let fs = FatBridgeFuse::new(ops, options);
    info!("Mounting FUSE filesystem at {}", options.mount_point);
    fuser::mount2(fs, &options.mount_point, &mount_options)?;
    info!("Unmounted {}", options.mount_point);
    Ok(())
}
