//! Catalog reader (§4.5): mount-time two-phase walk of the chunk
//! catalog that rebuilds the device registry's byte counts and the
//! mapping index.

use uuid::Uuid;

use crate::device::FsDevices;
use crate::disk_format::{ChunkItem, ChunkTreeItem, DiskKey, KeyType};
use crate::error::{Result, VolumeError};
use crate::mapping::{ChunkMapping, MappingIndex, StripeMapping};

/// Install one `CHUNK_ITEM` into the mapping index. Shared by the
/// superblock's bootstrap array and the full chunk-catalog walk, since
/// both produce the same `(key, chunk)` shape.
pub(crate) fn install_chunk_mapping(mapping: &mut MappingIndex, key: &DiskKey, chunk: &ChunkItem) {
    let stripes = chunk.stripes.iter().map(|s| StripeMapping { devid: s.devid, physical: s.offset }).collect();
    mapping.insert(key.objectid, key.offset, ChunkMapping { stripe_len: chunk.stripe_len, chunk_type: chunk.chunk_type, stripes });
}

fn apply_dev_item(fs: &mut FsDevices, devid: u64, item: &crate::disk_format::DevItem) {
    match fs.find_device_mut(devid) {
        Some(dev) => {
            dev.total_bytes = item.total_bytes;
            dev.bytes_used = item.bytes_used;
            dev.io_align = item.io_align;
            dev.io_width = item.io_width;
            dev.sector_size = item.sector_size;
            dev.dev_type = item.dev_type;
            dev.uuid = Uuid::from_bytes(item.uuid);
        }
        None => {
            // A DEV_ITEM with no corresponding scanned device: the
            // device is referenced by the catalog but wasn't found
            // during the scan phase (missing/unplugged, §4.1 edge case).
            // Leave the registry as-is; the second phase's stripe
            // resolution is what actually surfaces this as an error.
        }
    }
}

/// `btrfs_read_chunk_tree` (§4.5): restart the scan twice over the same
/// catalog, once filtering `DEV_ITEM` and once filtering `CHUNK_ITEM` —
/// a single ascending walk would interleave the two key ranges and
/// could hit a chunk's stripe before its device's byte counts are
/// known.
pub fn read_chunk_tree<C>(fs: &mut FsDevices, catalog: &C, mapping: &mut MappingIndex) -> Result<()>
where
    C: crate::catalog::Catalog<DiskKey, ChunkTreeItem>,
{
    let from_start = DiskKey { objectid: 0, key_type: KeyType::DevItem, offset: 0 };

    for (key, value) in catalog.range_from(&from_start) {
        if key.key_type != KeyType::DevItem {
            continue;
        }
        if let ChunkTreeItem::Device(item) = value {
            apply_dev_item(fs, key.offset, &item);
        }
    }

    for (key, value) in catalog.range_from(&from_start) {
        if key.key_type != KeyType::ChunkItem {
            continue;
        }
        let chunk = match value {
            ChunkTreeItem::Chunk(c) => c,
            ChunkTreeItem::Device(_) => continue,
        };

        for stripe in &chunk.stripes {
            if fs.find_device(stripe.devid).is_none() {
                return Err(VolumeError::MissingDevice { devid: stripe.devid });
            }
        }

        install_chunk_mapping(mapping, &key, &chunk);
    }

    Ok(())
}
