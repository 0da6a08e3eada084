//! On-disk record layouts (§6).
//!
//! Every multi-byte integer on disk is little-endian; encode/decode goes
//! through `byteorder`, the same crate the teacher's `bch_bindgen` uses
//! for its own endianness conversions, rather than hand-rolled shifts.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::bitmask::BlockGroupType;

/// Reserved objectid under which device items are keyed.
pub const DEV_ITEMS_OBJECTID: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyType {
    DevItem,
    DevExtent,
    ChunkItem,
}

impl KeyType {
    fn to_u8(self) -> u8 {
        match self {
            KeyType::DevItem => 1,
            KeyType::DevExtent => 2,
            KeyType::ChunkItem => 3,
        }
    }

    fn from_u8(v: u8) -> Option<KeyType> {
        match v {
            1 => Some(KeyType::DevItem),
            2 => Some(KeyType::DevExtent),
            3 => Some(KeyType::ChunkItem),
            _ => None,
        }
    }
}

/// `{objectid u64, type u8, offset u64}` — the universal catalog key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskKey {
    pub objectid: u64,
    pub key_type: KeyType,
    pub offset: u64,
}

impl DiskKey {
    pub fn dev_item(devid: u64) -> DiskKey {
        DiskKey { objectid: DEV_ITEMS_OBJECTID, key_type: KeyType::DevItem, offset: devid }
    }

    pub fn dev_extent(devid: u64, offset_on_device: u64) -> DiskKey {
        DiskKey { objectid: devid, key_type: KeyType::DevExtent, offset: offset_on_device }
    }

    pub fn chunk_item(logical_start: u64, length: u64) -> DiskKey {
        DiskKey { objectid: logical_start, key_type: KeyType::ChunkItem, offset: length }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.objectid)?;
        w.write_u8(self.key_type.to_u8())?;
        w.write_u64::<LittleEndian>(self.offset)
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<DiskKey> {
        let objectid = r.read_u64::<LittleEndian>()?;
        let raw_type = r.read_u8()?;
        let offset = r.read_u64::<LittleEndian>()?;
        let key_type = KeyType::from_u8(raw_type)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown disk key type"))?;
        Ok(DiskKey { objectid, key_type, offset })
    }
}

/// `{devid, total_bytes, bytes_used, io_align, io_width, sector_size, type, uuid}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevItem {
    pub devid: u64,
    pub total_bytes: u64,
    pub bytes_used: u64,
    pub io_align: u32,
    pub io_width: u32,
    pub sector_size: u32,
    pub dev_type: u64,
    pub uuid: [u8; 16],
}

impl DevItem {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.devid)?;
        w.write_u64::<LittleEndian>(self.total_bytes)?;
        w.write_u64::<LittleEndian>(self.bytes_used)?;
        w.write_u32::<LittleEndian>(self.io_align)?;
        w.write_u32::<LittleEndian>(self.io_width)?;
        w.write_u32::<LittleEndian>(self.sector_size)?;
        w.write_u64::<LittleEndian>(self.dev_type)?;
        w.write_all(&self.uuid)
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<DevItem> {
        let devid = r.read_u64::<LittleEndian>()?;
        let total_bytes = r.read_u64::<LittleEndian>()?;
        let bytes_used = r.read_u64::<LittleEndian>()?;
        let io_align = r.read_u32::<LittleEndian>()?;
        let io_width = r.read_u32::<LittleEndian>()?;
        let sector_size = r.read_u32::<LittleEndian>()?;
        let dev_type = r.read_u64::<LittleEndian>()?;
        let mut uuid = [0u8; 16];
        r.read_exact(&mut uuid)?;
        Ok(DevItem { devid, total_bytes, bytes_used, io_align, io_width, sector_size, dev_type, uuid })
    }
}

/// `{owner, length}` — the dev-extent value (key carries devid/offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevExtentItem {
    pub owner: u64,
    pub length: u64,
}

impl DevExtentItem {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.owner)?;
        w.write_u64::<LittleEndian>(self.length)
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<DevExtentItem> {
        let owner = r.read_u64::<LittleEndian>()?;
        let length = r.read_u64::<LittleEndian>()?;
        Ok(DevExtentItem { owner, length })
    }
}

/// `{devid, offset}` — one stripe slot within a chunk item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeOnDisk {
    pub devid: u64,
    pub offset: u64,
}

impl StripeOnDisk {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.devid)?;
        w.write_u64::<LittleEndian>(self.offset)
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<StripeOnDisk> {
        let devid = r.read_u64::<LittleEndian>()?;
        let offset = r.read_u64::<LittleEndian>()?;
        Ok(StripeOnDisk { devid, offset })
    }
}

/// `{length, owner, stripe_len, type, io_align, io_width, sector_size,
/// num_stripes, sub_stripes, stripe[0..num_stripes]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkItem {
    pub length: u64,
    pub owner: u64,
    pub stripe_len: u64,
    pub chunk_type: BlockGroupType,
    pub io_align: u32,
    pub io_width: u32,
    pub sector_size: u32,
    pub sub_stripes: u16,
    pub stripes: Vec<StripeOnDisk>,
}

impl ChunkItem {
    pub fn num_stripes(&self) -> u16 {
        self.stripes.len() as u16
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.length)?;
        w.write_u64::<LittleEndian>(self.owner)?;
        w.write_u64::<LittleEndian>(self.stripe_len)?;
        w.write_u64::<LittleEndian>(self.chunk_type.bits())?;
        w.write_u32::<LittleEndian>(self.io_align)?;
        w.write_u32::<LittleEndian>(self.io_width)?;
        w.write_u32::<LittleEndian>(self.sector_size)?;
        w.write_u16::<LittleEndian>(self.num_stripes())?;
        w.write_u16::<LittleEndian>(self.sub_stripes)?;
        for stripe in &self.stripes {
            stripe.write(w)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<ChunkItem> {
        let length = r.read_u64::<LittleEndian>()?;
        let owner = r.read_u64::<LittleEndian>()?;
        let stripe_len = r.read_u64::<LittleEndian>()?;
        let chunk_type = BlockGroupType::from_bits_retain(r.read_u64::<LittleEndian>()?);
        let io_align = r.read_u32::<LittleEndian>()?;
        let io_width = r.read_u32::<LittleEndian>()?;
        let sector_size = r.read_u32::<LittleEndian>()?;
        let num_stripes = r.read_u16::<LittleEndian>()?;
        let sub_stripes = r.read_u16::<LittleEndian>()?;
        let mut stripes = Vec::with_capacity(num_stripes as usize);
        for _ in 0..num_stripes {
            stripes.push(StripeOnDisk::read(r)?);
        }
        Ok(ChunkItem { length, owner, stripe_len, chunk_type, io_align, io_width, sector_size, sub_stripes, stripes })
    }
}

/// The chunk catalog's value type. Device items and chunk items share one
/// catalog (§4.5's mount-time walk relies on this: a single ascending scan
/// mixes `DEV_ITEM` and `CHUNK_ITEM` entries in key order), so the catalog
/// needs one `V` that can hold either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkTreeItem {
    Device(DevItem),
    Chunk(ChunkItem),
}
