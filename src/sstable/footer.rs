//! SSTable footer.
//!
//! The footer is the last 24 bytes of an SSTable file: six little-endian
//! `u32`s.
//!
//! ```text
//! [min_key_size][max_key_offset][max_key_size]
//! [data_blk_size][index_blk_size][flexible_blk_size]
//! ```
//!
//! "Keys" here are whole encoded entries: the smallest entry starts at offset
//! 0 of the data region and the largest ends where the data region ends.

use crate::error::{Error, Result};
use crate::sstable::FOOTER_SIZE;
use bytes::{Buf, BufMut};

/// Fixed trailer of an SSTable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Footer {
    /// Size of the first (smallest) entry.
    pub min_key_size: u32,
    /// Offset of the last (largest) entry.
    pub max_key_offset: u32,
    /// Size of the last entry.
    pub max_key_size: u32,
    /// Size of the data region.
    pub data_blk_size: u32,
    /// Size of the index block.
    pub index_blk_size: u32,
    /// Size of the flexible block.
    pub flexible_blk_size: u32,
}

impl Footer {
    /// Encodes the footer.
    pub fn encode(&self) -> [u8; FOOTER_SIZE] {
        let mut out = [0u8; FOOTER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.min_key_size);
        buf.put_u32_le(self.max_key_offset);
        buf.put_u32_le(self.max_key_size);
        buf.put_u32_le(self.data_blk_size);
        buf.put_u32_le(self.index_blk_size);
        buf.put_u32_le(self.flexible_blk_size);
        out
    }

    /// Decodes a footer from exactly [`FOOTER_SIZE`] bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != FOOTER_SIZE {
            return Err(Error::corruption(format!(
                "Footer size mismatch: expected {}, got {}",
                FOOTER_SIZE,
                data.len()
            )));
        }
        let mut buf = data;
        let footer = Self {
            min_key_size: buf.get_u32_le(),
            max_key_offset: buf.get_u32_le(),
            max_key_size: buf.get_u32_le(),
            data_blk_size: buf.get_u32_le(),
            index_blk_size: buf.get_u32_le(),
            flexible_blk_size: buf.get_u32_le(),
        };
        footer.validate()?;
        Ok(footer)
    }

    fn validate(&self) -> Result<()> {
        let max_end = u64::from(self.max_key_offset) + u64::from(self.max_key_size);
        if self.data_blk_size == 0
            || self.min_key_size == 0
            || self.min_key_size > self.data_blk_size
            || max_end != u64::from(self.data_blk_size)
        {
            return Err(Error::corruption(format!("inconsistent footer {:?}", self)));
        }
        if self.index_blk_size < 4 || self.index_blk_size % 4 != 0 {
            return Err(Error::corruption(format!(
                "index block size {} is not a multiple of 4",
                self.index_blk_size
            )));
        }
        Ok(())
    }

    /// Offset of the index block.
    pub fn index_offset(&self) -> u64 {
        u64::from(self.data_blk_size)
    }

    /// Offset of the flexible block.
    pub fn flexible_offset(&self) -> u64 {
        self.index_offset() + u64::from(self.index_blk_size)
    }

    /// Expected size of the whole file.
    pub fn file_size(&self) -> u64 {
        self.flexible_offset() + u64::from(self.flexible_blk_size) + FOOTER_SIZE as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Footer {
        Footer {
            min_key_size: 20,
            max_key_offset: 8180,
            max_key_size: 20,
            data_blk_size: 8200,
            index_blk_size: 12,
            flexible_blk_size: 12,
        }
    }

    #[test]
    fn test_footer_layout() {
        let encoded = sample().encode();
        assert_eq!(&encoded[0..4], &20u32.to_le_bytes());
        assert_eq!(&encoded[12..16], &8200u32.to_le_bytes());
        assert_eq!(Footer::decode(&encoded).unwrap(), sample());
    }

    #[test]
    fn test_offsets() {
        let footer = sample();
        assert_eq!(footer.index_offset(), 8200);
        assert_eq!(footer.flexible_offset(), 8212);
        assert_eq!(footer.file_size(), 8200 + 12 + 12 + 24);
    }

    #[test]
    fn test_rejects_bad_footers() {
        assert!(Footer::decode(&[0u8; 10]).is_err());
        assert!(Footer::decode(&[0u8; FOOTER_SIZE]).is_err());

        let mut footer = sample();
        footer.max_key_offset = 9000;
        assert!(Footer::decode(&footer.encode()).is_err());

        let mut footer = sample();
        footer.index_blk_size = 6;
        assert!(Footer::decode(&footer.encode()).is_err());
    }
}
