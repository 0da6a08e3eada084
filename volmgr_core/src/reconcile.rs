//! Opt-in reconciliation pass (§9, resolved open question): a crash
//! between `alloc_chunk`'s per-stripe `bytes_used` update and its chunk
//! insert leaves bytes accounted for with no owning chunk. This module
//! never rewrites `bytes_used` itself — it only reports the discrepancy
//! so an operator has an audit trail before deciding to act.

use std::collections::HashMap;

use crate::catalog::Catalog;
use crate::device::FsDevices;
use crate::disk_format::{ChunkTreeItem, DevExtentItem, DiskKey, KeyType};

/// One device whose `bytes_used` doesn't match what's actually reachable
/// from the chunk catalog's stripes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanReport {
    pub devid: u64,
    pub bytes_used: u64,
    pub reachable_bytes: u64,
}

/// `find_orphaned_reservations`: for every device, sum the lengths of
/// the dev-extents actually referenced by a chunk-catalog stripe, and
/// compare that total against the device's recorded `bytes_used`.
pub fn find_orphaned_reservations<ChunkC, ExtC>(fs: &FsDevices, chunks: &ChunkC, dev_extents: &ExtC) -> Vec<OrphanReport>
where
    ChunkC: Catalog<DiskKey, ChunkTreeItem>,
    ExtC: Catalog<DiskKey, DevExtentItem>,
{
    let mut reachable: HashMap<u64, u64> = HashMap::new();

    for (key, value) in chunks.range_from(&DiskKey { objectid: 0, key_type: KeyType::DevItem, offset: 0 }) {
        if key.key_type != KeyType::ChunkItem {
            continue;
        }
        let chunk = match value {
            ChunkTreeItem::Chunk(c) => c,
            ChunkTreeItem::Device(_) => continue,
        };
        for stripe in &chunk.stripes {
            if let Some(extent) = dev_extents.get(&DiskKey::dev_extent(stripe.devid, stripe.offset)) {
                *reachable.entry(stripe.devid).or_insert(0) += extent.length;
            }
        }
    }

    fs.devices
        .iter()
        .filter_map(|dev| {
            let got = reachable.get(&dev.devid).copied().unwrap_or(0);
            if got != dev.bytes_used {
                Some(OrphanReport { devid: dev.devid, bytes_used: dev.bytes_used, reachable_bytes: got })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmask::BlockGroupType;
    use crate::catalog::MemCatalog;
    use crate::chunk::{alloc_chunk, Catalogs};
    use crate::device::Device;
    use crate::mapping::MappingIndex;
    use crate::writer;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn fixture_fs() -> FsDevices {
        let fsid = Uuid::new_v4();
        let mut fs = FsDevices::new(fsid, 1, 1);
        fs.devices.push(Device {
            devid: 1,
            uuid: Uuid::new_v4(),
            fsid,
            path: PathBuf::from("/dev/fake"),
            handle: None,
            total_bytes: 1 << 30,
            bytes_used: 0,
            io_align: 4096,
            io_width: 4096,
            sector_size: 512,
            dev_type: 0,
        });
        fs
    }

    #[test]
    fn consistent_state_reports_nothing() {
        let mut fs = fixture_fs();
        let mut chunk_cat: MemCatalog<DiskKey, ChunkTreeItem> = MemCatalog::new();
        writer::add_device(&mut chunk_cat, &mut fs.devices[0]).unwrap();
        let mut ext_cat: MemCatalog<DiskKey, DevExtentItem> = MemCatalog::new();
        let mut mapping = MappingIndex::new();
        let mut catalogs = Catalogs { chunks: &mut chunk_cat, dev_extents: &mut ext_cat };
        alloc_chunk(&mut fs, &mut catalogs, &mut mapping, 2, BlockGroupType::DATA).unwrap();

        let report = find_orphaned_reservations(&fs, &chunk_cat, &ext_cat);
        assert!(report.is_empty());
    }

    #[test]
    fn reserved_extent_with_no_chunk_is_reported() {
        let mut fs = fixture_fs();
        let chunk_cat: MemCatalog<DiskKey, ChunkTreeItem> = MemCatalog::new();
        let mut ext_cat: MemCatalog<DiskKey, DevExtentItem> = MemCatalog::new();

        // Simulate the crash window: a dev-extent and a bytes_used bump
        // with no corresponding chunk-catalog insert.
        ext_cat.insert(DiskKey::dev_extent(1, 0), DevExtentItem { owner: 2, length: 8 << 20 }).unwrap();
        fs.devices[0].bytes_used = 8 << 20;

        let report = find_orphaned_reservations(&fs, &chunk_cat, &ext_cat);
        assert_eq!(report, vec![OrphanReport { devid: 1, bytes_used: 8 << 20, reachable_bytes: 0 }]);
    }
}
