// FAT16 Path Resolver
// Walks a path from the root directory down through subdirectories.
//
// The walk is an explicit loop over the encoded segments. A `root_depth`
// counter tracks how many levels below the root the walk currently is, so a
// `..` that climbs back to the root switches to the fixed root table instead
// of treating the root as a cluster chain.

use super::boot_sector::VolumeGeometry;
use super::directory::{DirectoryEntries, DirectoryLocation, LocatedEntry};
use super::short_name::{split_path, ShortName};
use crate::device_reader::ByteSource;
use fatbridge_core::BridgeError;
use log::{debug, trace};

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The volume root. It has no directory entry of its own.
    Root,
    /// A file or subdirectory entry.
    Entry(LocatedEntry),
    NotFound(NotFound),
}

/// Why a path did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    /// No entry in the directory carries this name.
    Unmatched { segment: String, depth: usize },
    /// A non-final segment names a file, so the path cannot continue.
    NotADirectory { segment: String, depth: usize },
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        !matches!(self, Resolution::NotFound(_))
    }

    /// The directory this resolution designates, if it is one.
    pub fn as_directory(&self) -> Option<DirectoryLocation> {
        match self {
            Resolution::Root => Some(DirectoryLocation::Root),
            Resolution::Entry(located) if located.entry.is_directory() => {
                Some(DirectoryLocation::of(&located.entry))
            }
            _ => None,
        }
    }

    /// Turn a miss into `BridgeError::NotFound` for callers that only care about hits.
    pub fn found(self, path: &str) -> Result<Resolved, BridgeError> {
        match self {
            Resolution::Root => Ok(Resolved::Root),
            Resolution::Entry(located) => Ok(Resolved::Entry(located)),
            Resolution::NotFound(reason) => Err(reason.into_error(path)),
        }
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Root,
    Entry(LocatedEntry),
}

impl NotFound {
    pub fn into_error(self, path: &str) -> BridgeError {
        match self {
            NotFound::Unmatched { segment, .. } => {
                BridgeError::NotFound(format!("'{}' in path {}", segment, path))
            }
            NotFound::NotADirectory { segment, .. } => BridgeError::NotADirectory(format!(
                "'{}' in path {} is a file",
                segment, path
            )),
        }
    }
}

/// Resolves paths against one volume.
pub struct Fat16PathResolver<'a> {
    geometry: &'a VolumeGeometry,
    source: &'a dyn ByteSource,
}

impl<'a> Fat16PathResolver<'a> {
    pub fn new(geometry: &'a VolumeGeometry, source: &'a dyn ByteSource) -> Self {
        Self { geometry, source }
    }

    /// Resolve a `/`-separated path.
    pub fn resolve_path(&self, path: &str) -> Result<Resolution, BridgeError> {
        debug!("Resolving FAT16 path: {}", path);
        let segments = split_path(path)?;
        self.resolve_segments(&segments)
    }

    /// Resolve already encoded segments, starting at the root.
    pub fn resolve_segments(&self, segments: &[ShortName]) -> Result<Resolution, BridgeError> {
        let mut location = DirectoryLocation::Root;
        let mut root_depth: u32 = 0;

        for (depth, segment) in segments.iter().enumerate() {
            let is_last = depth + 1 == segments.len();
            trace!("Resolving component {:?} in {:?} (root depth {})", segment, location, root_depth);

            // The root table holds no dot entries; both refer to the root itself.
            if location == DirectoryLocation::Root && (segment.is_dot() || segment.is_dot_dot()) {
                if is_last {
                    return Ok(Resolution::Root);
                }
                continue;
            }

            let Some(located) = self.find_in(location, segment)? else {
                return Ok(Resolution::NotFound(NotFound::Unmatched {
                    segment: segment.decode(),
                    depth,
                }));
            };

            if !located.entry.is_directory() {
                if is_last {
                    return Ok(Resolution::Entry(located));
                }
                return Ok(Resolution::NotFound(NotFound::NotADirectory {
                    segment: segment.decode(),
                    depth,
                }));
            }

            if segment.is_dot_dot() {
                root_depth = root_depth.saturating_sub(1);
            } else if !segment.is_dot() {
                root_depth += 1;
            }

            let next = match DirectoryLocation::of(&located.entry) {
                // Only `.` and `..` may carry cluster 0.
                DirectoryLocation::Root if !segment.is_dot() && !segment.is_dot_dot() => {
                    return Err(BridgeError::CorruptChain(format!(
                        "directory {} at sector {} slot {} has no first cluster",
                        segment.decode(),
                        located.sector,
                        located.slot
                    )));
                }
                _ if root_depth == 0 => DirectoryLocation::Root,
                DirectoryLocation::Root => {
                    // A dot entry that points at the root: the counter was off.
                    root_depth = 0;
                    DirectoryLocation::Root
                }
                cluster => cluster,
            };

            if is_last {
                return Ok(match next {
                    DirectoryLocation::Root => Resolution::Root,
                    DirectoryLocation::Cluster(_) => Resolution::Entry(located),
                });
            }
            location = next;
        }

        Ok(Resolution::Root)
    }

    /// Scan one directory for an entry whose 11-byte name equals `name`.
    pub fn find_in(
        &self,
        location: DirectoryLocation,
        name: &ShortName,
    ) -> Result<Option<LocatedEntry>, BridgeError> {
        for located in DirectoryEntries::new(location, self.geometry, self.source)? {
            let located = located?;
            if located.entry.name == *name {
                trace!("Matched {:?} at sector {} slot {}", name, located.sector, located.slot);
                return Ok(Some(located));
            }
        }
        Ok(None)
    }
}
