//! Logical-to-physical mapping index (§4.4).
//!
//! The original source's `cache_extent` tree — an intrusive, generic
//! interval cache keyed by `start` — becomes an ordered `BTreeMap` here,
//! per the design note in §9: "lookup is the entry with greatest start
//! <= query".

use std::collections::BTreeMap;

use crate::bitmask::BlockGroupType;
use crate::error::{Result, VolumeError};

/// One stripe slot's physical location. Stripes reference devices by
/// `devid`, never by owning pointer — resolving a devid to a live
/// `Device` is the registry's job (§9: "back-references from stripe to
/// device").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeMapping {
    pub devid: u64,
    pub physical: u64,
}

/// The chunk mapping installed in the index: everything `map_block`
/// needs to translate a logical offset within this chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMapping {
    pub stripe_len: u64,
    pub chunk_type: BlockGroupType,
    pub stripes: Vec<StripeMapping>,
}

impl ChunkMapping {
    pub fn num_stripes(&self) -> u64 {
        self.stripes.len() as u64
    }
}

/// The result of a `map_block` query: where to actually perform I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMapping {
    pub devid: u64,
    pub physical: u64,
    pub length: u64,
}

/// Ordered, non-overlapping interval map from logical offsets to chunks.
#[derive(Debug, Default)]
pub struct MappingIndex {
    // keyed by logical start; value is (size, chunk).
    entries: BTreeMap<u64, (u64, ChunkMapping)>,
}

impl MappingIndex {
    pub fn new() -> MappingIndex {
        MappingIndex { entries: BTreeMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, start: u64, size: u64) -> bool {
        matches!(self.entries.get(&start), Some((s, _)) if *s == size)
    }

    /// Install a mapping entry. Intervals must be non-overlapping; this
    /// is an invariant maintained by every caller (chunk allocation,
    /// mount-time catalog reads), not re-validated against the full
    /// index here — see §3 and §8's invariant list.
    pub fn insert(&mut self, start: u64, size: u64, chunk: ChunkMapping) {
        debug_assert!(size > 0, "mapping entries must be non-empty");
        self.entries.insert(start, (size, chunk));
    }

    fn entry_for(&self, logical: u64) -> Result<(u64, &u64, &ChunkMapping)> {
        let (start, (size, chunk)) = self
            .entries
            .range(..=logical)
            .next_back()
            .ok_or_else(|| VolumeError::Corruption(format!("no mapping entry covers logical offset {logical}")))?;
        if logical >= start + *size {
            return Err(VolumeError::Corruption(format!("no mapping entry covers logical offset {logical}")));
        }
        Ok((*start, size, chunk))
    }

    /// `map_block` (§4.4): translate a logical offset to a physical one,
    /// applying RAID0-style striping uniformly (degenerates to a plain
    /// offset add when `num_stripes == 1`).
    pub fn map_block(&self, logical: u64) -> Result<BlockMapping> {
        let (start, size, chunk) = self.entry_for(logical)?;
        let offset = logical - start;

        let stripe_len = chunk.stripe_len;
        let num_stripes = chunk.num_stripes();
        let stripe_nr = offset / stripe_len;
        let stripe_offset = offset - stripe_nr * stripe_len;
        let stripe_index = (stripe_nr % num_stripes) as usize;
        let stripe_round = stripe_nr / num_stripes;

        let stripe = &chunk.stripes[stripe_index];
        let physical = stripe.physical + stripe_round * stripe_len + stripe_offset;

        let length = if chunk.chunk_type.contains(BlockGroupType::RAID0) {
            (*size - offset).min(stripe_len - stripe_offset)
        } else {
            *size - offset
        };

        Ok(BlockMapping { devid: stripe.devid, physical, length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_stripe_chunk() -> ChunkMapping {
        ChunkMapping {
            stripe_len: 64 * 1024,
            chunk_type: BlockGroupType::DATA,
            stripes: vec![StripeMapping { devid: 1, physical: 0 }],
        }
    }

    fn raid0_chunk(len: u64) -> ChunkMapping {
        ChunkMapping {
            stripe_len: 64 * 1024,
            chunk_type: BlockGroupType::DATA | BlockGroupType::RAID0,
            stripes: vec![
                StripeMapping { devid: 1, physical: 0 },
                StripeMapping { devid: 2, physical: 0 },
            ],
        }
    }
    #[test]
    fn single_device_chunk_maps_with_plain_offset_add() {
        let mut idx = MappingIndex::new();
        idx.insert(0, 8 << 20, single_stripe_chunk());

        let m = idx.map_block(0).unwrap();
        assert_eq!(m, BlockMapping { devid: 1, physical: 0, length: 8 << 20 });

        let m = idx.map_block(100).unwrap();
        assert_eq!(m.physical, 100);
        assert_eq!(m.length, (8 << 20) - 100);
    }

    #[test]
    fn raid0_chunk_alternates_stripes_and_clamps_length() {
        let mut idx = MappingIndex::new();
        idx.insert(0, 16 << 20, raid0_chunk(16 << 20));

        let m0 = idx.map_block(0).unwrap();
        assert_eq!(m0.devid, 1);
        assert_eq!(m0.physical, 0);
        assert_eq!(m0.length, 64 * 1024);

        let m1 = idx.map_block(64 * 1024).unwrap();
        assert_eq!(m1.devid, 2);
        assert_eq!(m1.physical, 0);
        assert_eq!(m1.length, 64 * 1024);

        let m2 = idx.map_block(128 * 1024).unwrap();
        assert_eq!(m2.devid, 1);
        assert_eq!(m2.physical, 64 * 1024);
    }

    #[test]
    fn unmapped_offset_is_corruption() {
        let idx = MappingIndex::new();
        assert!(idx.map_block(0).is_err());
    }

    #[test]
    fn offset_past_chunk_end_is_corruption() {
        let mut idx = MappingIndex::new();
        idx.insert(0, 8 << 20, single_stripe_chunk());
        assert!(idx.map_block(8 << 20).is_err());
    }

    #[test]
    fn last_byte_of_chunk_is_defined() {
        let mut idx = MappingIndex::new();
        idx.insert(100, 8 << 20, single_stripe_chunk());
        let m = idx.map_block(100 + (8 << 20) - 1).unwrap();
        assert_eq!(m.length, 1);
    }
}
