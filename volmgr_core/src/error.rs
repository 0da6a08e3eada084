//! Error taxonomy for the volume-manager core.
//!
//! The original source treats most of these conditions (§7 of the design
//! doc) as fatal assertions and aborts the process. We keep the same
//! "do not continue" spirit but surface it as a typed error so a caller
//! (a transaction layer, a CLI command) can log structurally and decide
//! how to unmount instead of calling `abort()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("out of memory")]
    OutOfMemory,

    #[error("no space left to satisfy allocation of {requested} bytes")]
    NoSpace { requested: u64 },

    #[error("not a btrfs superblock")]
    NotBtrfs,

    #[error("catalog entry not found: {0}")]
    NotFound(String),

    #[error("sys_chunk_array would exceed its {cap}-byte cap (have {current}, need {additional} more)")]
    TooBig { current: usize, additional: usize, cap: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("on-disk corruption: {0}")]
    Corruption(String),

    #[error("chunk stripe references unknown devid {devid}")]
    MissingDevice { devid: u64 },
}

pub type Result<T> = std::result::Result<T, VolumeError>;
