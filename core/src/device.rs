use crate::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A volume image the bridge can mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Path of the image file or block device.
    pub id: String,
    pub name: String,
    pub size: u64,
    pub device_type: DeviceType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceType {
    ImageFile,
    BlockDevice,
    Unknown,
}

impl Device {
    /// Describe an image on disk without opening it for reading.
    pub fn from_image_path(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        let device_type = if metadata.is_file() {
            DeviceType::ImageFile
        } else if is_block_device(&metadata) {
            DeviceType::BlockDevice
        } else {
            return Err(BridgeError::Configuration(format!(
                "{} is neither an image file nor a block device",
                path.display()
            )));
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Device {
            id: path.to_string_lossy().into_owned(),
            name,
            size: metadata.len(),
            device_type,
        })
    }
}

#[cfg(unix)]
fn is_block_device(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    metadata.file_type().is_block_device()
}

#[cfg(not(unix))]
fn is_block_device(_metadata: &std::fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn describes_image_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 1024]).unwrap();

        let device = Device::from_image_path(file.path()).unwrap();
        assert_eq!(device.size, 1024);
        assert_eq!(device.device_type, DeviceType::ImageFile);
        assert_eq!(device.id, file.path().to_string_lossy());
    }

    #[test]
    fn missing_image_is_io_error() {
        let err = Device::from_image_path("/nonexistent/fat16.img").unwrap_err();
        assert!(matches!(err, BridgeError::IoError(_)));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Device::from_image_path(dir.path()).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn device_round_trips_through_json() {
        let device = Device {
            id: "/tmp/fat16.img".to_string(),
            name: "fat16.img".to_string(),
            size: 4096,
            device_type: DeviceType::ImageFile,
        };
        let json = serde_json::to_string(&device).unwrap();
        let back: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, device.id);
        assert_eq!(back.device_type, DeviceType::ImageFile);
    }
}
