//! Serialized snapshot of one synthetic filesystem's catalog state.
//!
//! The real superblock writer and block I/O layer are out of scope
//! (§1), so the CLI commands that exercise the library operations work
//! against a JSON sidecar describing a `FsDevices` plus its chunk and
//! dev-extent catalogs, rather than a live mounted filesystem.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use volmgr_core::catalog::{Catalog, MemCatalog};
use volmgr_core::device::{Device, FsDevices};
use volmgr_core::disk_format::{ChunkItem, ChunkTreeItem, DevExtentItem, DevItem, DiskKey, StripeOnDisk};
use volmgr_core::mapping::MappingIndex;
use volmgr_core::reader;

#[derive(Debug, Serialize, Deserialize)]
pub struct FixtureDevice {
    pub devid: u64,
    pub uuid: Uuid,
    pub total_bytes: u64,
    pub bytes_used: u64,
    pub sector_size: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FixtureDevExtent {
    pub devid: u64,
    pub offset: u64,
    pub owner: u64,
    pub length: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FixtureStripe {
    pub devid: u64,
    pub offset: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FixtureChunk {
    pub logical_start: u64,
    pub length: u64,
    pub owner: u64,
    pub stripe_len: u64,
    pub chunk_type: u64,
    pub sector_size: u32,
    pub stripes: Vec<FixtureStripe>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Fixture {
    pub fsid: Uuid,
    #[serde(default)]
    pub alloc_cursor: usize,
    #[serde(default)]
    pub devices: Vec<FixtureDevice>,
    #[serde(default)]
    pub dev_extents: Vec<FixtureDevExtent>,
    #[serde(default)]
    pub chunks: Vec<FixtureChunk>,
}

/// The in-memory state rebuilt from (and written back to) a fixture file.
pub struct Runtime {
    pub fs: FsDevices,
    pub chunk_catalog: MemCatalog<DiskKey, ChunkTreeItem>,
    pub dev_extent_catalog: MemCatalog<DiskKey, DevExtentItem>,
    pub mapping: MappingIndex,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Fixture> {
        let text = fs::read_to_string(path).with_context(|| format!("reading fixture {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing fixture {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serializing fixture")?;
        fs::write(path, text).with_context(|| format!("writing fixture {}", path.display()))
    }

    pub fn empty(fsid: Uuid) -> Fixture {
        Fixture { fsid, alloc_cursor: 0, devices: Vec::new(), dev_extents: Vec::new(), chunks: Vec::new() }
    }

    /// Rebuild the runtime catalogs and mapping index from this fixture's
    /// serialized records (the "catalog reader" side of round-tripping a
    /// fixture, per §4.5/§4.7).
    pub fn to_runtime(&self) -> Result<Runtime> {
        let mut fs_devices = FsDevices::new(self.fsid, 0, 0);
        let mut chunk_catalog: MemCatalog<DiskKey, ChunkTreeItem> = MemCatalog::new();

        for dev in &self.devices {
            fs_devices.devices.push(Device {
                devid: dev.devid,
                uuid: dev.uuid,
                fsid: self.fsid,
                path: std::path::PathBuf::new(),
                handle: None,
                total_bytes: dev.total_bytes,
                bytes_used: dev.bytes_used,
                io_align: dev.sector_size,
                io_width: dev.sector_size,
                sector_size: dev.sector_size,
                dev_type: 0,
            });
            chunk_catalog.insert(
                DiskKey::dev_item(dev.devid),
                ChunkTreeItem::Device(DevItem {
                    devid: dev.devid,
                    total_bytes: dev.total_bytes,
                    bytes_used: dev.bytes_used,
                    io_align: dev.sector_size,
                    io_width: dev.sector_size,
                    sector_size: dev.sector_size,
                    dev_type: 0,
                    uuid: *dev.uuid.as_bytes(),
                }),
            )?;
        }
        fs_devices.alloc_cursor = self.alloc_cursor;

        let mut dev_extent_catalog: MemCatalog<DiskKey, DevExtentItem> = MemCatalog::new();
        for ext in &self.dev_extents {
            dev_extent_catalog.insert(DiskKey::dev_extent(ext.devid, ext.offset), DevExtentItem { owner: ext.owner, length: ext.length })?;
        }

        for chunk in &self.chunks {
            let item = ChunkItem {
                length: chunk.length,
                owner: chunk.owner,
                stripe_len: chunk.stripe_len,
                chunk_type: volmgr_core::bitmask::BlockGroupType::from_bits_retain(chunk.chunk_type),
                io_align: chunk.stripe_len as u32,
                io_width: chunk.stripe_len as u32,
                sector_size: chunk.sector_size,
                sub_stripes: 1,
                stripes: chunk.stripes.iter().map(|s| StripeOnDisk { devid: s.devid, offset: s.offset }).collect(),
            };
            chunk_catalog.insert(DiskKey::chunk_item(chunk.logical_start, chunk.length), ChunkTreeItem::Chunk(item))?;
        }

        let mut mapping = MappingIndex::new();
        reader::read_chunk_tree(&mut fs_devices, &chunk_catalog, &mut mapping)?;

        Ok(Runtime { fs: fs_devices, chunk_catalog, dev_extent_catalog, mapping })
    }

    /// Flatten a runtime back into the serializable shape, for writing
    /// after a command mutates it.
    pub fn from_runtime(fsid: Uuid, runtime: &Runtime) -> Fixture {
        let devices = runtime
            .fs
            .devices
            .iter()
            .map(|d| FixtureDevice { devid: d.devid, uuid: d.uuid, total_bytes: d.total_bytes, bytes_used: d.bytes_used, sector_size: d.sector_size })
            .collect();

        let dev_extents = runtime
            .dev_extent_catalog
            .range_from(&DiskKey::dev_extent(0, 0))
            .into_iter()
            .map(|(k, v)| FixtureDevExtent { devid: k.objectid, offset: k.offset, owner: v.owner, length: v.length })
            .collect();

        let chunks = runtime
            .chunk_catalog
            .range_from(&DiskKey { objectid: 0, key_type: volmgr_core::disk_format::KeyType::DevItem, offset: 0 })
            .into_iter()
            .filter_map(|(k, v)| match v {
                ChunkTreeItem::Chunk(c) => Some(FixtureChunk {
                    logical_start: k.objectid,
                    length: c.length,
                    owner: c.owner,
                    stripe_len: c.stripe_len,
                    chunk_type: c.chunk_type.bits(),
                    sector_size: c.sector_size,
                    stripes: c.stripes.iter().map(|s| FixtureStripe { devid: s.devid, offset: s.offset }).collect(),
                }),
                ChunkTreeItem::Device(_) => None,
            })
            .collect();

        Fixture { fsid, alloc_cursor: runtime.fs.alloc_cursor, devices, dev_extents, chunks }
    }
}
