//! Chunk type bitmask (`BLOCK_GROUP_*`).
//!
//! Mirrors the teacher's use of `bitflags!` for on-disk flag fields
//! (`bch_bindgen::btree::BtreeIterFlags`), generalized from a single
//! generated-from-C enum to the small fixed set this layer interprets.
//! Values outside this set (mirroring, parity, profile hints) are out of
//! scope per the spec's non-goals but are still round-tripped bit-for-bit
//! through the raw `u64` on disk, so the bitmask only claims the bits it
//! actually interprets.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BlockGroupType: u64 {
        const DATA     = 1 << 0;
        const SYSTEM   = 1 << 1;
        const METADATA = 1 << 2;
        const RAID0    = 1 << 3;
    }
}

impl BlockGroupType {
    /// Stripe length derived from the type, per §4.3: 64 KiB for DATA,
    /// 32 KiB for METADATA or SYSTEM.
    pub fn default_stripe_len(self) -> u64 {
        if self.intersects(BlockGroupType::METADATA | BlockGroupType::SYSTEM) {
            32 * 1024
        } else {
            64 * 1024
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_len_for_data() {
        assert_eq!(BlockGroupType::DATA.default_stripe_len(), 64 * 1024);
    }

    #[test]
    fn stripe_len_for_metadata_and_system() {
        assert_eq!(BlockGroupType::METADATA.default_stripe_len(), 32 * 1024);
        assert_eq!(BlockGroupType::SYSTEM.default_stripe_len(), 32 * 1024);
    }

    #[test]
    fn raid0_combines_with_data() {
        let t = BlockGroupType::DATA | BlockGroupType::RAID0;
        assert!(t.contains(BlockGroupType::RAID0));
        assert_eq!(t.default_stripe_len(), 64 * 1024);
    }

    #[test]
    fn unknown_bits_round_trip() {
        let raw = BlockGroupType::DATA.bits() | (1 << 40);
        let t = BlockGroupType::from_bits_retain(raw);
        assert_eq!(t.bits(), raw);
        assert!(t.contains(BlockGroupType::DATA));
    }
}
