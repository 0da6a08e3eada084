//! Superblock bootstrap state (§4.5/§4.6): the small embedded
//! `sys_chunk_array` that lets mount find the SYSTEM chunk(s) needed to
//! read the real chunk catalog, before the chunk catalog itself is
//! readable.

use crate::disk_format::{ChunkItem, DiskKey, KeyType};
use crate::error::{Result, VolumeError};

/// Real btrfs fixes this at 2048 bytes; kept the same so the cap's
/// consequences (§8 scenario 6) are reachable with realistic chunk sizes.
pub const SYS_CHUNK_ARRAY_SIZE: usize = 2048;

fn encoded_len(key: &DiskKey, chunk: &ChunkItem) -> usize {
    let mut buf = Vec::new();
    key.write(&mut buf).expect("writing to a Vec cannot fail");
    chunk.write(&mut buf).expect("writing to a Vec cannot fail");
    buf.len()
}

/// The superblock's embedded copy of every SYSTEM chunk (§4.6), stored
/// as `(key, chunk)` pairs in insertion order, with a running byte total
/// enforcing the on-disk cap.
#[derive(Debug, Clone, Default)]
pub struct SysChunkArray {
    entries: Vec<(DiskKey, ChunkItem)>,
    used_bytes: usize,
}

impl SysChunkArray {
    pub fn new() -> SysChunkArray {
        SysChunkArray { entries: Vec::new(), used_bytes: 0 }
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn entries(&self) -> &[(DiskKey, ChunkItem)] {
        &self.entries
    }

    /// Append a SYSTEM chunk (§4.6). Fails with `TooBig` rather than
    /// truncating or wrapping if the cap would be exceeded.
    pub fn add_system_chunk(&mut self, key: DiskKey, chunk: ChunkItem) -> Result<()> {
        let additional = encoded_len(&key, &chunk);
        if self.used_bytes + additional > SYS_CHUNK_ARRAY_SIZE {
            return Err(VolumeError::TooBig { current: self.used_bytes, additional, cap: SYS_CHUNK_ARRAY_SIZE });
        }
        self.used_bytes += additional;
        self.entries.push((key, chunk));
        Ok(())
    }
}

/// Superblock fields this layer cares about (§6); everything else
/// (label, feature bits, checksum algorithm) is out of scope.
#[derive(Debug, Clone)]
pub struct Superblock {
    pub fsid: uuid::Uuid,
    pub generation: u64,
    pub num_devices: u32,
    pub sys_chunk_array: SysChunkArray,
}

/// `read_sys_array` (§4.5 phase 0): install every chunk embedded in the
/// superblock's bootstrap array into the mapping index. Any entry whose
/// key isn't a `CHUNK_ITEM` is on-disk corruption — the bootstrap array
/// holds nothing else.
pub fn read_sys_array(sb: &Superblock, mapping: &mut crate::mapping::MappingIndex) -> Result<()> {
    for (key, chunk) in sb.sys_chunk_array.entries() {
        if key.key_type != KeyType::ChunkItem {
            return Err(VolumeError::Corruption(format!("sys_chunk_array entry with unexpected key type at objectid {}", key.objectid)));
        }
        crate::reader::install_chunk_mapping(mapping, key, chunk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmask::BlockGroupType;
    use crate::disk_format::StripeOnDisk;

    fn system_chunk() -> ChunkItem {
        ChunkItem {
            length: 8 << 20,
            owner: 1,
            stripe_len: 32 * 1024,
            chunk_type: BlockGroupType::SYSTEM,
            io_align: 32 * 1024,
            io_width: 32 * 1024,
            sector_size: 512,
            sub_stripes: 1,
            stripes: vec![StripeOnDisk { devid: 1, offset: 0 }],
        }
    }

    #[test]
    fn add_system_chunk_tracks_used_bytes() {
        let mut arr = SysChunkArray::new();
        assert_eq!(arr.used_bytes(), 0);
        arr.add_system_chunk(DiskKey::chunk_item(0, 8 << 20), system_chunk()).unwrap();
        assert!(arr.used_bytes() > 0);
        assert_eq!(arr.entries().len(), 1);
    }

    #[test]
    fn add_system_chunk_rejects_overflow_of_the_cap() {
        let mut arr = SysChunkArray::new();
        let mut next_offset = 0u64;
        loop {
            let mut chunk = system_chunk();
            // Vary the stripe count so each entry has a distinct encoded
            // size, matching how real growth looks (more devices over
            // time), rather than N identical fixed-size pushes.
            chunk.stripes.push(StripeOnDisk { devid: 2, offset: next_offset });
            match arr.add_system_chunk(DiskKey::chunk_item(next_offset, 8 << 20), chunk) {
                Ok(()) => next_offset += 8 << 20,
                Err(VolumeError::TooBig { .. }) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(arr.used_bytes() <= SYS_CHUNK_ARRAY_SIZE);
    }
}
