//! Index block implementation for SSTable.
//!
//! ```text
//! [count: u32][offset_0: u32]...[offset_{count-1}: u32]
//! ```
//!
//! Offsets are the start of each data block. Block `i` ends where block `i + 1`
//! starts; the last block ends at the end of the data region.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut};
use std::ops::Range;

/// Decoded index block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBlock {
    offsets: Vec<u32>,
    data_size: u32,
}

impl IndexBlock {
    /// Creates an index over a data region of `data_size` bytes.
    pub fn new(offsets: Vec<u32>, data_size: u32) -> Result<Self> {
        if offsets.is_empty() || offsets[0] != 0 {
            return Err(Error::corruption("index must start with a block at offset 0"));
        }
        let ascending = offsets.windows(2).all(|w| w[0] < w[1]);
        let last = offsets[offsets.len() - 1];
        if !ascending || last >= data_size {
            return Err(Error::corruption(format!(
                "index offsets out of order or beyond data size {}",
                data_size
            )));
        }
        Ok(Self { offsets, data_size })
    }

    /// Size of the encoded block for `count` offsets.
    pub fn encoded_size(count: usize) -> usize {
        (count + 1) * 4
    }

    /// Encodes `offsets` as an index block.
    pub fn encode_offsets(offsets: &[u32]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::encoded_size(offsets.len()));
        buf.put_u32_le(offsets.len() as u32);
        for &offset in offsets {
            buf.put_u32_le(offset);
        }
        buf
    }

    /// Decodes an index block read from a file whose data region is
    /// `data_size` bytes.
    pub fn decode(data: &[u8], data_size: u32) -> Result<Self> {
        let mut buf = data;
        if buf.remaining() < 4 {
            return Err(Error::corruption("index block too short"));
        }
        let count = buf.get_u32_le() as usize;
        if buf.remaining() != count * 4 {
            return Err(Error::corruption(format!(
                "index block holds {} bytes for {} offsets",
                buf.remaining(),
                count
            )));
        }
        let offsets = (0..count).map(|_| buf.get_u32_le()).collect();
        Self::new(offsets, data_size)
    }

    /// Number of data blocks.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Always false for a decoded index; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Byte range of block `i` inside the file.
    pub fn block_range(&self, i: usize) -> Option<Range<u64>> {
        let start = *self.offsets.get(i)?;
        let end = self.offsets.get(i + 1).copied().unwrap_or(self.data_size);
        Some(u64::from(start)..u64::from(end))
    }
}
