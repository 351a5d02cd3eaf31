// FAT16 volume reader
//
// `Fat16Volume` owns the shared byte source and the geometry derived from the
// boot sector. Every operation takes `&self` and reads through positioned
// reads, so one volume can serve concurrent callers.

use super::boot_sector::{derive_geometry, VolumeGeometry, BOOT_SECTOR_SIZE};
use super::cluster_chain::ClusterChain;
use super::directory::{DirEntry, DirectoryEntries, DirectoryLocation};
use super::fat_table::count_free_clusters;
use super::path_resolver::{Fat16PathResolver, Resolution, Resolved};
use crate::device_reader::{open_image, ByteSource};
use fatbridge_core::BridgeError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Summary of a mounted volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub fs_type: String,
    pub label: Option<String>,
    pub oem_name: String,
    pub volume_id: u32,
    pub cluster_size: u32,
    pub total_clusters: u32,
    pub free_clusters: u32,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Clone)]
pub struct Fat16Volume {
    source: Arc<dyn ByteSource>,
    geometry: VolumeGeometry,
}

impl fmt::Debug for Fat16Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fat16Volume")
            .field("image_len", &self.source.len())
            .field("geometry", &self.geometry)
            .finish()
    }
}

impl Fat16Volume {
    /// Read the boot sector and derive the geometry. Nothing else is read.
    pub fn mount(source: Arc<dyn ByteSource>) -> Result<Self, BridgeError> {
        if source.len() < BOOT_SECTOR_SIZE as u64 {
            return Err(BridgeError::MalformedBootSector(format!(
                "image is {} bytes, smaller than a boot sector",
                source.len()
            )));
        }

        let mut boot = [0u8; BOOT_SECTOR_SIZE];
        source.read_exact_at(0, &mut boot)?;
        let geometry = derive_geometry(&boot)?;

        info!("FAT16 volume details:");
        info!("  Label: {}", geometry.label().unwrap_or_else(|| "<none>".to_string()));
        info!("  Bytes per sector: {}", geometry.bytes_per_sector);
        info!("  Sectors per cluster: {}", geometry.sectors_per_cluster);
        info!("  Root entries: {}", geometry.root_entries);
        info!("  First root sector: {}", geometry.first_root_sector);
        info!("  First data sector: {}", geometry.first_data_sector);
        info!("  Total clusters: {}", geometry.total_clusters);

        let expected = geometry.total_sectors as u64 * geometry.bytes_per_sector as u64;
        if expected > source.len() {
            warn!(
                "Image is {} bytes but the boot sector describes {} bytes; reads past the end will fail",
                source.len(),
                expected
            );
        }

        Ok(Self { source, geometry })
    }

    /// Open an image file and mount it.
    pub fn open(path: &Path) -> Result<Self, BridgeError> {
        info!("Opening FAT16 image: {}", path.display());
        Self::mount(open_image(path)?)
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn source(&self) -> &dyn ByteSource {
        self.source.as_ref()
    }

    /// Resolve a `/`-separated path. Misses are reported in the result, not as errors.
    pub fn resolve(&self, path: &str) -> Result<Resolution, BridgeError> {
        Fat16PathResolver::new(&self.geometry, self.source()).resolve_path(path)
    }

    /// Resolve a path that must exist.
    pub fn lookup(&self, path: &str) -> Result<Resolved, BridgeError> {
        self.resolve(path)?.found(path)
    }

    /// Resolve a path that must name a directory.
    pub fn directory_at(&self, path: &str) -> Result<DirectoryLocation, BridgeError> {
        match self.lookup(path)? {
            Resolved::Root => Ok(DirectoryLocation::Root),
            Resolved::Entry(located) if located.entry.is_directory() => {
                Ok(DirectoryLocation::of(&located.entry))
            }
            Resolved::Entry(_) => Err(BridgeError::NotADirectory(path.to_string())),
        }
    }

    /// Lazy scan of one directory.
    pub fn entries(&self, location: DirectoryLocation) -> Result<DirectoryEntries<'_>, BridgeError> {
        DirectoryEntries::new(location, &self.geometry, self.source())
    }

    /// All live entries of a directory with their display names, in on-disk order.
    /// Subdirectories include their `.` and `..` entries.
    ///
    /// Entries whose on-disk name cannot be reached through a path (embedded
    /// spaces, lower-case or non-ASCII bytes) are left out, so every listed
    /// name resolves.
    pub fn list_directory(
        &self,
        location: DirectoryLocation,
    ) -> Result<Vec<(String, DirEntry)>, BridgeError> {
        debug!("Listing FAT16 directory {:?}", location);
        let mut listing = Vec::new();
        for located in self.entries(location)? {
            let located = located?;
            if !located.entry.name.is_addressable() {
                warn!(
                    "Skipping entry {:?} in {:?}: its name has no valid path form",
                    located.entry.name, location
                );
                continue;
            }
            listing.push((located.entry.display_name(), located.entry));
        }
        Ok(listing)
    }

    /// Read up to `length` bytes of a file starting at `offset`.
    ///
    /// The range is clamped to the file size; reading at or past the end
    /// returns no bytes. A chain that ends before the file size is a corrupt chain.
    pub fn read_file_range(
        &self,
        entry: &DirEntry,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, BridgeError> {
        let size = entry.file_size as u64;
        if offset >= size || length == 0 {
            return Ok(Vec::new());
        }
        let wanted = (size - offset).min(length) as usize;

        let bytes_per_sector = self.geometry.bytes_per_sector as u64;
        let mut chain = ClusterChain::new(entry.first_cluster(), &self.geometry, self.source())?;
        chain.skip_sectors(offset / bytes_per_sector)?;
        let mut skip = (offset % bytes_per_sector) as usize;

        debug!(
            "Reading {} bytes at offset {} of {} (first cluster {})",
            wanted,
            offset,
            entry.display_name(),
            entry.first_cluster()
        );

        let mut data = Vec::with_capacity(wanted);
        while data.len() < wanted {
            let Some(sector) = chain.next().transpose()? else {
                return Err(BridgeError::CorruptChain(format!(
                    "chain of {} ends after {} of {} bytes",
                    entry.display_name(),
                    offset + data.len() as u64,
                    size
                )));
            };
            let available = &sector.data[skip..];
            skip = 0;
            let take = available.len().min(wanted - data.len());
            data.extend_from_slice(&available[..take]);
        }

        Ok(data)
    }

    /// Read a whole file.
    pub fn read_file(&self, entry: &DirEntry) -> Result<Vec<u8>, BridgeError> {
        self.read_file_range(entry, 0, entry.file_size as u64)
    }

    /// Number of free clusters according to the first FAT.
    pub fn free_clusters(&self) -> Result<u32, BridgeError> {
        count_free_clusters(&self.geometry, self.source())
    }

    pub fn info(&self) -> Result<VolumeInfo, BridgeError> {
        let free_clusters = self.free_clusters()?;
        let cluster_size = self.geometry.bytes_per_cluster();
        let total_clusters = self.geometry.total_clusters;

        Ok(VolumeInfo {
            fs_type: "FAT16".to_string(),
            label: self.geometry.label(),
            oem_name: self.geometry.oem_name(),
            volume_id: self.geometry.volume_id,
            cluster_size,
            total_clusters,
            free_clusters,
            total_bytes: total_clusters as u64 * cluster_size as u64,
            used_bytes: (total_clusters - free_clusters.min(total_clusters)) as u64
                * cluster_size as u64,
        })
    }
}
