// FAT16 module - read-only volume engine

pub mod boot_sector;
pub mod cluster_chain;
pub mod directory;
pub mod fat_table;
pub mod ops;
pub mod path_resolver;
pub mod reader;
pub mod short_name;
pub mod timestamps;

pub use boot_sector::{derive_geometry, VolumeGeometry};
pub use directory::{DirEntry, DirectoryLocation, FatAttributes, LocatedEntry};
pub use ops::Fat16Ops;
pub use path_resolver::{NotFound, Resolution, Resolved};
pub use reader::{Fat16Volume, VolumeInfo};
pub use short_name::ShortName;
