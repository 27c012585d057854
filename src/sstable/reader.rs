//! SSTable reader implementation.
//!
//! [`TableMeta`] is everything about a table that is small enough to keep in
//! memory: footer, index, flexible block and the min/max entries. Data blocks
//! are read on demand through a pooled [`BlockReader`].

use crate::arena::Arena;
use crate::coding::internal_entry::split_entries;
use crate::coding::{EntryComparator, QueryComparator};
use crate::error::{Error, Result};
use crate::filter::{BloomFilter, Filter};
use crate::sstable::flexible::FlexibleBlock;
use crate::sstable::footer::Footer;
use crate::sstable::index::IndexBlock;
use crate::sstable::FOOTER_SIZE;
use crate::storage::BlockReader;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// In-memory description of one SST file.
#[derive(Debug, Clone)]
pub struct TableMeta {
    /// Basename without extension, e.g. `000000000000002A`.
    pub name: String,
    /// Full path of the file.
    pub path: PathBuf,
    /// Decoded footer.
    pub footer: Footer,
    /// Data block offsets.
    pub index: IndexBlock,
    /// Checksum, max id and filter.
    pub flexible: FlexibleBlock,
    /// Smallest entry.
    pub min_entry: Bytes,
    /// Largest entry.
    pub max_entry: Bytes,
}

impl TableMeta {
    /// Reads footer, index, flexible block and min/max entries of a table.
    pub fn load(reader: &mut BlockReader, path: &Path, name: impl Into<String>) -> Result<Self> {
        let file_size = reader.file_size(path)?;
        if file_size < FOOTER_SIZE as u64 {
            return Err(Error::corruption(format!(
                "{} is too small to be a table ({} bytes)",
                path.display(),
                file_size
            )));
        }
        let footer = Footer::decode(reader.read_at(path, file_size - FOOTER_SIZE as u64, FOOTER_SIZE)?)?;
        if footer.file_size() != file_size {
            return Err(Error::corruption(format!(
                "{}: footer describes {} bytes, file has {}",
                path.display(),
                footer.file_size(),
                file_size
            )));
        }

        let index = IndexBlock::decode(
            reader.read_at(path, footer.index_offset(), footer.index_blk_size as usize)?,
            footer.data_blk_size,
        )?;
        let flexible = FlexibleBlock::decode(Bytes::copy_from_slice(reader.read_at(
            path,
            footer.flexible_offset(),
            footer.flexible_blk_size as usize,
        )?))?;
        let min_entry = Bytes::copy_from_slice(reader.read_at(path, 0, footer.min_key_size as usize)?);
        let max_entry = Bytes::copy_from_slice(reader.read_at(
            path,
            u64::from(footer.max_key_offset),
            footer.max_key_size as usize,
        )?);

        Ok(Self { name: name.into(), path: path.to_path_buf(), footer, index, flexible, min_entry, max_entry })
    }

    /// Whether `probe`'s key falls inside the table's key range.
    pub fn contains(&self, probe: &[u8]) -> bool {
        let cmp = QueryComparator;
        cmp.less_or_equal(&self.min_entry, probe) && cmp.less_or_equal(probe, &self.max_entry)
    }

    /// Whether the key range `[min, max]` intersects the table's.
    pub fn overlaps(&self, min: &[u8], max: &[u8]) -> bool {
        let cmp = QueryComparator;
        cmp.less_or_equal(&self.min_entry, max) && cmp.less_or_equal(min, &self.max_entry)
    }

    /// Consults the table's bloom filter. Tables without one may contain anything.
    pub fn may_contain_key(&self, policy: &BloomFilter, key: &[u8]) -> bool {
        !self.flexible.has_filter() || policy.may_contain(&self.flexible.filter, key)
    }

    /// Number of data blocks.
    pub fn num_blocks(&self) -> usize {
        self.index.len()
    }

    /// Raw bytes of data block `i`.
    pub fn read_block<'r>(&self, reader: &'r mut BlockReader, i: usize) -> Result<&'r [u8]> {
        let range = self
            .index
            .block_range(i)
            .ok_or_else(|| Error::bad_argument(format!("{} has no block {}", self.name, i)))?;
        reader.read_at(&self.path, range.start, (range.end - range.start) as usize)
    }

    /// Looks up the entry for `probe`'s key.
    ///
    /// Blocks are binary searched in query order; the chosen block is scanned
    /// for an entry with an equal key. The hit is copied out of the scratch
    /// arena, which is dropped when the lookup ends.
    pub fn get(
        &self,
        reader: &mut BlockReader,
        probe: &[u8],
        policy: Option<&BloomFilter>,
    ) -> Result<Option<Vec<u8>>> {
        if !self.contains(probe) {
            return Ok(None);
        }
        if let Some(policy) = policy {
            if !self.may_contain_key(policy, crate::coding::entry_key(probe)) {
                return Ok(None);
            }
        }

        let cmp = QueryComparator;
        let mut arena = Arena::for_query();
        let (mut lo, mut hi) = (0, self.num_blocks());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let raw = self.read_block(reader, mid)?;
            let slot = arena
                .allocate_copy(raw)
                .ok_or_else(|| Error::undefined("query arena exhausted"))?;
            let block = arena.slice(slot).unwrap_or_default();
            let entries = split_entries(block)?;

            if let Some(hit) = entries.iter().rev().find(|e| cmp.equal(e, probe)) {
                return Ok(Some(hit.to_vec()));
            }
            match entries.last() {
                Some(last) if cmp.greater(probe, last) => lo = mid + 1,
                _ => hi = mid,
            }
            arena.unref(slot.block);
            arena.release_idle_space();
        }
        Ok(None)
    }

    /// Every entry of the table, in order.
    pub fn entries(&self, reader: &mut BlockReader) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        for i in 0..self.num_blocks() {
            let block = self.read_block(reader, i)?;
            out.extend(split_entries(block)?.into_iter().map(|e| e.to_vec()));
        }
        Ok(out)
    }

    /// Recomputes the data region checksum and compares it with the stored one.
    pub fn verify_checksum(&self, reader: &mut BlockReader) -> Result<()> {
        let data = reader.read_at(&self.path, 0, self.footer.data_blk_size as usize)?;
        let actual = crc32fast::hash(data);
        let expected = self.flexible.data_checksum;
        if actual != expected {
            return Err(Error::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }
}
