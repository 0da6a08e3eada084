//! Core, non-FFI logic of the multi-device volume manager: device
//! registry, device-extent allocator, chunk allocator, logical-to-physical
//! mapping index, and the catalog reader/writer that glue them to the
//! B-tree engine collaborator modeled by [`catalog::Catalog`].

pub mod bitmask;
pub mod catalog;
pub mod chunk;
pub mod device;
pub mod disk_format;
pub mod error;
pub mod extent;
pub mod mapping;
pub mod reader;
pub mod reconcile;
pub mod superblock;
pub mod writer;

pub use chunk::{alloc_chunk, Catalogs};
pub use device::{Device, FilesystemRegistry, FsDevices};
pub use disk_format::{ChunkItem, ChunkTreeItem, DevExtentItem, DevItem, DiskKey, KeyType, StripeOnDisk};
pub use error::{Result, VolumeError};
pub use mapping::{BlockMapping, ChunkMapping, MappingIndex, StripeMapping};
pub use superblock::{Superblock, SysChunkArray};
