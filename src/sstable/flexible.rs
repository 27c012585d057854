//! Flexible block: per-file metadata that does not fit the fixed footer.
//!
//! ```text
//! [data_crc32: u32][max_entry_id: u64][bloom filter bytes ...]
//! ```
//!
//! The filter part is empty when bloom filters are disabled.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes};

/// Size of the fixed part of the block.
pub const FLEXIBLE_HEADER_SIZE: usize = 12;

/// Decoded flexible block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlexibleBlock {
    /// CRC32 of the data region.
    pub data_checksum: u32,
    /// Largest entry id stored in the file.
    pub max_entry_id: u64,
    /// Serialized bloom filter, possibly empty.
    pub filter: Bytes,
}

impl FlexibleBlock {
    /// Encodes the block.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FLEXIBLE_HEADER_SIZE + self.filter.len());
        buf.put_u32_le(self.data_checksum);
        buf.put_u64_le(self.max_entry_id);
        buf.put_slice(&self.filter);
        buf
    }

    /// Decodes a block.
    pub fn decode(data: Bytes) -> Result<Self> {
        if data.len() < FLEXIBLE_HEADER_SIZE {
            return Err(Error::corruption(format!(
                "flexible block too short: {} bytes",
                data.len()
            )));
        }
        let mut header = &data[..FLEXIBLE_HEADER_SIZE];
        let data_checksum = header.get_u32_le();
        let max_entry_id = header.get_u64_le();
        Ok(Self { data_checksum, max_entry_id, filter: data.slice(FLEXIBLE_HEADER_SIZE..) })
    }

    /// Whether the file carries a bloom filter.
    pub fn has_filter(&self) -> bool {
        !self.filter.is_empty()
    }
}
