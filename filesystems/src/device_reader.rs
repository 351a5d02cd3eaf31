// Positioned-read access to a volume image.
// Every read names its own offset, so concurrent traversals never share a cursor.

use fatbridge_core::BridgeError;
use log::trace;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Read-only random-access byte source backing a mounted volume.
pub trait ByteSource: Send + Sync {
    /// Fill `buf` with the bytes starting at `offset`, or fail.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for File {
    #[cfg(unix)]
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_exact_at(&self, offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        let mut offset = offset;
        while !buf.is_empty() {
            match self.seek_read(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ))
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn len(&self) -> u64 {
        self.metadata().map(|m| m.len()).unwrap_or(0)
    }
}

/// An image held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    data: Vec<u8>,
}

impl MemoryImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSource for MemoryImage {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "offset beyond image"))?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("read of {} bytes at {:#x} runs past end of image", buf.len(), offset),
                )
            })?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Arc<T> {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact_at(offset, buf)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

/// Open an image file read-only as a shareable byte source.
pub fn open_image(path: &Path) -> Result<Arc<dyn ByteSource>, BridgeError> {
    let file = File::open(path)?;
    Ok(Arc::new(file))
}

/// Read one whole sector into a fresh buffer.
pub fn read_sector(
    source: &dyn ByteSource,
    bytes_per_sector: u16,
    sector: u32,
) -> Result<Vec<u8>, BridgeError> {
    let offset = sector as u64 * bytes_per_sector as u64;
    trace!("Reading sector {} at offset {:#x}", sector, offset);

    let mut buf = vec![0u8; bytes_per_sector as usize];
    source.read_exact_at(offset, &mut buf)?;
    Ok(buf)
}
