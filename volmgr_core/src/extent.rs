//! Device-extent allocator (§4.2): first-fit over the sorted gaps of one
//! device's existing reservations.

use crate::catalog::Catalog;
use crate::disk_format::{DevExtentItem, DiskKey, KeyType};
use crate::error::{Result, VolumeError};

fn finalize(start: u64, num_bytes: u64, total_bytes: u64) -> Result<u64> {
    if start.checked_add(num_bytes).map_or(true, |end| end > total_bytes) {
        return Err(VolumeError::NoSpace { requested: num_bytes });
    }
    Ok(start)
}

/// `find_free_dev_extent` (§4.2). The search is a single ascending walk
/// of the dev-extent catalog starting at `(devid, 0)` — the "search,
/// step back one slot, then walk forward" dance in the original source
/// is an artifact of the B-tree path API; an ordered-map `range_from`
/// gives the same ascending sequence directly.
pub fn find_free_dev_extent<C>(catalog: &C, devid: u64, total_bytes: u64, num_bytes: u64) -> Result<u64>
where
    C: Catalog<DiskKey, DevExtentItem>,
{
    let mut last_byte: u64 = 0;
    let mut any_entry = false;

    for (key, item) in catalog.range_from(&DiskKey::dev_extent(devid, 0)) {
        if key.objectid != devid || key.key_type != KeyType::DevExtent {
            break;
        }
        any_entry = true;

        if key.offset > last_byte && key.offset - last_byte >= num_bytes {
            return finalize(last_byte, num_bytes, total_bytes);
        }
        last_byte = last_byte.max(key.offset + item.length);
    }

    let start = if any_entry { last_byte } else { 0 };
    finalize(start, num_bytes, total_bytes)
}

/// `btrfs_alloc_dev_extent` (§4.2/§4.3 step 5): find free space, then
/// reserve it by inserting the catalog entry.
pub fn alloc_dev_extent<C>(catalog: &mut C, devid: u64, total_bytes: u64, owner: u64, num_bytes: u64) -> Result<u64>
where
    C: Catalog<DiskKey, DevExtentItem>,
{
    let start = find_free_dev_extent(catalog, devid, total_bytes, num_bytes)?;
    catalog.insert(DiskKey::dev_extent(devid, start), DevExtentItem { owner, length: num_bytes })?;
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemCatalog;

    fn catalog_with(extents: &[(u64, u64, u64)]) -> MemCatalog<DiskKey, DevExtentItem> {
        let mut cat = MemCatalog::new();
        for &(devid, offset, length) in extents {
            cat.insert(DiskKey::dev_extent(devid, offset), DevExtentItem { owner: 1, length }).unwrap();
        }
        cat
    }

    #[test]
    fn empty_catalog_succeeds_at_zero() {
        let cat: MemCatalog<DiskKey, DevExtentItem> = MemCatalog::new();
        let start = find_free_dev_extent(&cat, 1, 1 << 30, 8 << 20).unwrap();
        assert_eq!(start, 0);
    }

    #[test]
    fn gap_first_fit_between_two_extents() {
        // [0, 8MiB) and [24MiB, 40MiB) on devid 1.
        let cat = catalog_with(&[(1, 0, 8 << 20), (1, 24 << 20, 16 << 20)]);

        let start = find_free_dev_extent(&cat, 1, 1 << 30, 8 << 20).unwrap();
        assert_eq!(start, 8 << 20);
    }

    #[test]
    fn no_gap_falls_back_to_end_of_last_extent() {
        let cat = catalog_with(&[(1, 0, 8 << 20), (1, 24 << 20, 16 << 20)]);

        let start = find_free_dev_extent(&cat, 1, 1 << 30, 20 << 20).unwrap();
        assert_eq!(start, 40 << 20);
    }

    #[test]
    fn fails_when_tail_does_not_fit_device() {
        let cat = catalog_with(&[(1, 0, 8 << 20), (1, 24 << 20, 16 << 20)]);
        // total_bytes just short of 40MiB + 20MiB.
        let total = 40 << 20;
        assert!(matches!(
            find_free_dev_extent(&cat, 1, total, 20 << 20),
            Err(VolumeError::NoSpace { .. })
        ));
    }

    #[test]
    fn other_devids_do_not_affect_search() {
        let cat = catalog_with(&[(2, 0, 100 << 20)]);
        let start = find_free_dev_extent(&cat, 1, 1 << 30, 8 << 20).unwrap();
        assert_eq!(start, 0);
    }

    #[test]
    fn alloc_dev_extent_reserves_the_found_range() {
        let mut cat: MemCatalog<DiskKey, DevExtentItem> = MemCatalog::new();
        let start = alloc_dev_extent(&mut cat, 1, 1 << 30, 42, 8 << 20).unwrap();
        assert_eq!(start, 0);
        assert_eq!(cat.get(&DiskKey::dev_extent(1, 0)), Some(DevExtentItem { owner: 42, length: 8 << 20 }));

        // Second reservation must not overlap the first.
        let start2 = alloc_dev_extent(&mut cat, 1, 1 << 30, 42, 8 << 20).unwrap();
        assert_eq!(start2, 8 << 20);
    }
}
