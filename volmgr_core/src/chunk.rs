//! Chunk allocator (§4.3): the device-selection policy plus the bundle
//! that ties the device-extent allocator, the chunk catalog, and the
//! mapping index together into one atomic-looking allocation.

use crate::bitmask::BlockGroupType;
use crate::catalog::Catalog;
use crate::device::FsDevices;
use crate::disk_format::{ChunkItem, ChunkTreeItem, DevExtentItem, DiskKey, StripeOnDisk};
use crate::error::{Result, VolumeError};
use crate::extent;
use crate::mapping::{ChunkMapping, MappingIndex, StripeMapping};
use crate::writer;

/// Fixed per-stripe reservation size (§4.3). Real btrfs scales this with
/// filesystem size; a fixed value keeps the allocator's arithmetic
/// legible and is all the spec's scenarios exercise.
pub const DEFAULT_CALC_SIZE: u64 = 8 * 1024 * 1024;

/// The two catalogs `alloc_chunk` needs, bundled so the function doesn't
/// carry two independent generic parameters at every call site.
pub struct Catalogs<'a, ChunkC, ExtC> {
    pub chunks: &'a mut ChunkC,
    pub dev_extents: &'a mut ExtC,
}

/// Pick `num_stripes` devices with at least `calc_size` bytes free,
/// starting the scan at `start` and wrapping once (§4.3's rotating
/// cursor, §9). If too few devices qualify, retry once at the largest
/// single device's availability (the "best-effort shrink"); a second
/// failure is `NoSpace`.
fn select_devices(devices: &[crate::device::Device], start: usize, num_stripes: usize, mut calc_size: u64) -> Result<(Vec<usize>, u64)> {
    let n = devices.len();
    let mut retried = false;

    loop {
        let mut selected = Vec::new();
        let mut max_avail: u64 = 0;

        for step in 0..n {
            let idx = (start + step) % n;
            let avail = devices[idx].avail_bytes();
            if avail > max_avail {
                max_avail = avail;
            }
            if avail >= calc_size {
                selected.push(idx);
                if selected.len() == num_stripes {
                    break;
                }
            }
        }

        if selected.len() == num_stripes {
            return Ok((selected, calc_size));
        }
        if retried || max_avail == 0 {
            return Err(VolumeError::NoSpace { requested: calc_size });
        }
        retried = true;
        calc_size = max_avail;
    }
}

/// `btrfs_alloc_chunk` (§4.3): select devices, reserve a dev-extent on
/// each, persist the updated `bytes_used`, insert the chunk record, and
/// install the mapping entry. Returns the new chunk's `(logical_start,
/// length)`.
pub fn alloc_chunk<ChunkC, ExtC>(
    fs: &mut FsDevices,
    catalogs: &mut Catalogs<'_, ChunkC, ExtC>,
    mapping: &mut MappingIndex,
    owner: u64,
    chunk_type: BlockGroupType,
) -> Result<(u64, u64)>
where
    ChunkC: Catalog<DiskKey, ChunkTreeItem>,
    ExtC: Catalog<DiskKey, DevExtentItem>,
{
    if fs.devices.is_empty() {
        return Err(VolumeError::NoSpace { requested: DEFAULT_CALC_SIZE });
    }

    let num_stripes: usize = if chunk_type.contains(BlockGroupType::RAID0) { fs.devices.len() } else { 1 };
    let stripe_len = chunk_type.default_stripe_len();

    let start_cursor = fs.alloc_cursor % fs.devices.len();
    let (selected, calc_size) = select_devices(&fs.devices, start_cursor, num_stripes, DEFAULT_CALC_SIZE)?;

    let logical_start = match writer::highest_chunk_item(catalogs.chunks) {
        Some((key, _)) => key.objectid + key.offset,
        None => 0,
    };

    let mut stripes_disk = Vec::with_capacity(num_stripes);
    let mut stripes_map = Vec::with_capacity(num_stripes);
    let mut chosen_sector_size = 0;

    for &idx in &selected {
        let devid = fs.devices[idx].devid;
        let total_bytes = fs.devices[idx].total_bytes;
        let dev_offset = extent::alloc_dev_extent(catalogs.dev_extents, devid, total_bytes, owner, calc_size)?;

        fs.devices[idx].bytes_used += calc_size;
        chosen_sector_size = fs.devices[idx].sector_size;
        writer::update_device(catalogs.chunks, &fs.devices[idx])?;

        stripes_disk.push(StripeOnDisk { devid, offset: dev_offset });
        stripes_map.push(StripeMapping { devid, physical: dev_offset });
    }

    fs.alloc_cursor = (selected[selected.len() - 1] + 1) % fs.devices.len();

    let length = calc_size * num_stripes as u64;
    let chunk_item = ChunkItem {
        length,
        owner,
        stripe_len,
        chunk_type,
        io_align: stripe_len as u32,
        io_width: stripe_len as u32,
        sector_size: chosen_sector_size,
        sub_stripes: 1,
        stripes: stripes_disk,
    };

    writer::add_chunk_item(catalogs.chunks, DiskKey::chunk_item(logical_start, length), chunk_item)?;

    mapping.insert(logical_start, length, ChunkMapping { stripe_len, chunk_type, stripes: stripes_map });

    Ok((logical_start, length))
}
