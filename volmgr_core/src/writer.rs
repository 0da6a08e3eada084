//! Catalog writer (§4.6): the mutation side of the chunk catalog and the
//! superblock's bootstrap sys-chunk array.

use crate::catalog::Catalog;
use crate::device::Device;
use crate::disk_format::{ChunkItem, ChunkTreeItem, DevItem, DiskKey, KeyType};
use crate::error::Result;

fn dev_item_from_device(device: &Device) -> DevItem {
    DevItem {
        devid: device.devid,
        total_bytes: device.total_bytes,
        bytes_used: device.bytes_used,
        io_align: device.io_align,
        io_width: device.io_width,
        sector_size: device.sector_size,
        dev_type: device.dev_type,
        uuid: *device.uuid.as_bytes(),
    }
}

/// Highest devid among `DEV_ITEM` entries, ignoring any `CHUNK_ITEM`
/// entries that share the catalog.
fn highest_devid<C: Catalog<DiskKey, ChunkTreeItem>>(catalog: &C) -> Option<u64> {
    catalog
        .range_from(&DiskKey { objectid: 0, key_type: KeyType::DevItem, offset: 0 })
        .into_iter()
        .filter_map(|(k, v)| match v {
            ChunkTreeItem::Device(_) if k.key_type == KeyType::DevItem => Some(k.offset),
            _ => None,
        })
        .last()
}

/// Add a new device record, assigning it the next free devid (§4.6).
pub fn add_device<C: Catalog<DiskKey, ChunkTreeItem>>(catalog: &mut C, device: &mut Device) -> Result<()> {
    let next_devid = highest_devid(catalog).map(|id| id + 1).unwrap_or(1);
    device.devid = next_devid;
    let item = dev_item_from_device(device);
    catalog.insert(DiskKey::dev_item(next_devid), ChunkTreeItem::Device(item))
}

/// Overwrite an existing device record, used after `bytes_used` changes
/// (chunk allocation/free).
pub fn update_device<C: Catalog<DiskKey, ChunkTreeItem>>(catalog: &mut C, device: &Device) -> Result<()> {
    let key = DiskKey::dev_item(device.devid);
    let item = dev_item_from_device(device);
    catalog.update(key, ChunkTreeItem::Device(item))
}

/// Highest key among `CHUNK_ITEM` entries, ignoring `DEV_ITEM` entries
/// that share the catalog. Used by the chunk allocator to pick the next
/// free logical objectid.
pub fn highest_chunk_item<C: Catalog<DiskKey, ChunkTreeItem>>(catalog: &C) -> Option<(DiskKey, ChunkItem)> {
    catalog
        .range_from(&DiskKey { objectid: 0, key_type: KeyType::DevItem, offset: 0 })
        .into_iter()
        .filter_map(|(k, v)| match v {
            ChunkTreeItem::Chunk(c) if k.key_type == KeyType::ChunkItem => Some((k, c)),
            _ => None,
        })
        .last()
}

/// Insert a newly allocated chunk record.
pub fn add_chunk_item<C: Catalog<DiskKey, ChunkTreeItem>>(catalog: &mut C, key: DiskKey, chunk: ChunkItem) -> Result<()> {
    catalog.insert(key, ChunkTreeItem::Chunk(chunk))
}
