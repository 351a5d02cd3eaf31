// Lazy sector-by-sector traversal of a cluster chain

use super::boot_sector::VolumeGeometry;
use super::fat_table::next_cluster;
use crate::device_reader::{read_sector, ByteSource};
use fatbridge_core::BridgeError;
use log::trace;

/// Position inside a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterCursor {
    pub cluster: u16,
    /// Next sector to yield within `cluster`. Equal to sectors-per-cluster
    /// once the cluster is exhausted and its successor not yet looked up.
    pub sector_in_cluster: u8,
}

/// One sector of a chain, with where it came from.
#[derive(Debug, Clone)]
pub struct ChainSector {
    pub cluster: u16,
    pub sector: u32,
    pub data: Vec<u8>,
}

/// Iterator over the sectors of a file or directory, starting at its first
/// cluster and following FAT links until end-of-chain.
///
/// The FAT is only consulted when the consumer asks for the sector after the
/// last one of a cluster. Visiting more clusters than the volume holds stops
/// the walk with `CorruptChain`. After any error the iterator is finished.
pub struct ClusterChain<'a> {
    geometry: &'a VolumeGeometry,
    source: &'a dyn ByteSource,
    cursor: Option<ClusterCursor>,
    visited: u32,
}

impl<'a> ClusterChain<'a> {
    /// Start a chain at `first_cluster`. Cluster 0 is an empty chain.
    pub fn new(
        first_cluster: u16,
        geometry: &'a VolumeGeometry,
        source: &'a dyn ByteSource,
    ) -> Result<Self, BridgeError> {
        let mut chain = Self { geometry, source, cursor: None, visited: 0 };
        if first_cluster != 0 {
            chain.enter(first_cluster)?;
            chain.cursor = Some(ClusterCursor { cluster: first_cluster, sector_in_cluster: 0 });
        }
        Ok(chain)
    }

    pub fn cursor(&self) -> Option<ClusterCursor> {
        self.cursor
    }

    /// Skip `count` sectors without reading them.
    pub fn skip_sectors(&mut self, mut count: u64) -> Result<(), BridgeError> {
        while count > 0 {
            let Some(mut cursor) = self.position()? else {
                return Ok(());
            };
            let left = (self.geometry.sectors_per_cluster - cursor.sector_in_cluster) as u64;
            let step = left.min(count);
            cursor.sector_in_cluster += step as u8;
            count -= step;
            self.cursor = Some(cursor);
        }
        Ok(())
    }

    fn enter(&mut self, cluster: u16) -> Result<(), BridgeError> {
        if !self.geometry.is_data_cluster(cluster) {
            return Err(BridgeError::CorruptChain(format!(
                "cluster {} is outside the data region (2..={})",
                cluster,
                self.geometry.last_cluster()
            )));
        }
        self.visited += 1;
        if self.visited > self.geometry.max_chain_length() {
            return Err(BridgeError::CorruptChain(format!(
                "chain visits more than {} clusters, the FAT has a cycle",
                self.geometry.max_chain_length()
            )));
        }
        trace!("Entering cluster {} ({} visited)", cluster, self.visited);
        Ok(())
    }

    /// Current cursor, following the FAT first if the current cluster is used up.
    fn position(&mut self) -> Result<Option<ClusterCursor>, BridgeError> {
        let Some(cursor) = self.cursor else {
            return Ok(None);
        };
        if cursor.sector_in_cluster < self.geometry.sectors_per_cluster {
            return Ok(Some(cursor));
        }

        match next_cluster(cursor.cluster, self.geometry, self.source)? {
            Some(next) => {
                self.enter(next)?;
                let cursor = ClusterCursor { cluster: next, sector_in_cluster: 0 };
                self.cursor = Some(cursor);
                Ok(Some(cursor))
            }
            None => {
                trace!("End of chain after cluster {}", cursor.cluster);
                self.cursor = None;
                Ok(None)
            }
        }
    }

    fn read_next(&mut self) -> Result<Option<ChainSector>, BridgeError> {
        let Some(mut cursor) = self.position()? else {
            return Ok(None);
        };
        let sector =
            self.geometry.cluster_to_sector(cursor.cluster) + cursor.sector_in_cluster as u32;
        let data = read_sector(self.source, self.geometry.bytes_per_sector, sector)?;

        cursor.sector_in_cluster += 1;
        self.cursor = Some(cursor);

        Ok(Some(ChainSector { cluster: cursor.cluster, sector, data }))
    }
}

impl Iterator for ClusterChain<'_> {
    type Item = Result<ChainSector, BridgeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(sector)) => Some(Ok(sector)),
            Ok(None) => None,
            Err(e) => {
                self.cursor = None;
                Some(Err(e))
            }
        }
    }
}
