pub mod device;
pub mod error;

pub use device::{Device, DeviceType};
pub use error::BridgeError;
