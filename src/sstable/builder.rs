//! SSTable builder implementation.
//!
//! Builds an SSTable file from encoded internal entries supplied in strictly
//! ascending storage order.

use crate::coding::{entry_id, entry_key, entry_len, EntryComparator, InternalEntryComparator};
use crate::error::{Error, Result};
use crate::filter::{BloomFilter, Filter};
use crate::sstable::flexible::FlexibleBlock;
use crate::sstable::footer::Footer;
use crate::sstable::index::IndexBlock;
use crate::sstable::DEFAULT_BLOCK_SIZE;
use bytes::Bytes;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// What a finished build produced.
#[derive(Debug, Clone)]
pub struct TableSummary {
    /// Path of the file.
    pub path: PathBuf,
    /// Entries written.
    pub num_entries: usize,
    /// Data blocks written.
    pub num_blocks: usize,
    /// Total file size.
    pub file_size: u64,
    /// Smallest entry.
    pub min_entry: Vec<u8>,
    /// Largest entry.
    pub max_entry: Vec<u8>,
    /// Largest entry id in the file.
    pub max_entry_id: u64,
}

/// SstBuilder builds an SSTable file.
///
/// Usage:
/// ```no_run
/// use tcdb::coding::{encode_to_vec, OpType};
/// use tcdb::sstable::SstBuilder;
///
/// let mut builder = SstBuilder::new("0000000000000001.tdb").unwrap();
/// builder.add(&encode_to_vec(b"key1", b"value1", 1, OpType::Insert)).unwrap();
/// builder.add(&encode_to_vec(b"key2", b"value2", 2, OpType::Insert)).unwrap();
/// builder.finish().unwrap();
/// ```
pub struct SstBuilder<'a> {
    writer: BufWriter<File>,
    path: PathBuf,
    block_size: usize,
    filter: Option<&'a BloomFilter>,
    offsets: Vec<u32>,
    current_block_len: usize,
    data_size: u64,
    min_entry: Vec<u8>,
    last_entry: Vec<u8>,
    max_entry_id: u64,
    checksum: crc32fast::Hasher,
    filter_keys: Vec<Vec<u8>>,
    num_entries: usize,
}

impl<'a> SstBuilder<'a> {
    /// Create a new SstBuilder writing to `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref()).map_err(|e| {
            Error::file_io(format!("cannot create {}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.as_ref().to_path_buf(),
            block_size: DEFAULT_BLOCK_SIZE,
            filter: None,
            offsets: Vec::new(),
            current_block_len: 0,
            data_size: 0,
            min_entry: Vec::new(),
            last_entry: Vec::new(),
            max_entry_id: 0,
            checksum: crc32fast::Hasher::new(),
            filter_keys: Vec::new(),
            num_entries: 0,
        })
    }

    /// Set the data block target size (default: 4KB)
    pub fn set_block_size(&mut self, size: usize) {
        self.block_size = size.max(1);
    }

    /// Attach a bloom filter policy; the filter lands in the flexible block.
    pub fn set_filter(&mut self, filter: &'a BloomFilter) {
        self.filter = Some(filter);
    }

    /// Appends an encoded entry.
    ///
    /// A data block is closed by the entry that carries it past the target
    /// size, so blocks may run over the target by up to one entry.
    pub fn add(&mut self, entry: &[u8]) -> Result<()> {
        if entry.is_empty() || entry[0] == 0 || entry_len(entry) != Some(entry.len()) {
            return Err(Error::bad_argument("not a well-formed internal entry"));
        }
        if !self.last_entry.is_empty() && !InternalEntryComparator.less(&self.last_entry, entry) {
            return Err(Error::bad_argument("entries must be added in ascending order"));
        }
        let new_size = self.data_size + entry.len() as u64;
        if new_size > u64::from(u32::MAX) {
            return Err(Error::bad_argument("table data region exceeds 4GiB"));
        }

        if self.current_block_len == 0 {
            self.offsets.push(self.data_size as u32);
        }
        self.writer
            .write_all(entry)
            .map_err(|e| Error::file_io(format!("write {}: {}", self.path.display(), e)))?;
        self.checksum.update(entry);
        self.data_size = new_size;
        self.current_block_len += entry.len();
        if self.current_block_len > self.block_size {
            self.current_block_len = 0;
        }

        if self.num_entries == 0 {
            self.min_entry = entry.to_vec();
        }
        self.last_entry.clear();
        self.last_entry.extend_from_slice(entry);
        self.max_entry_id = self.max_entry_id.max(entry_id(entry));
        if self.filter.is_some() {
            self.filter_keys.push(entry_key(entry).to_vec());
        }
        self.num_entries += 1;
        Ok(())
    }

    /// Writes the index block, flexible block and footer, then syncs the file.
    pub fn finish(mut self) -> Result<TableSummary> {
        if self.num_entries == 0 {
            return Err(Error::bad_argument("cannot write an empty table"));
        }

        let index = IndexBlock::encode_offsets(&self.offsets);
        let filter = match self.filter {
            Some(policy) => policy.create_filter(self.filter_keys.iter().map(|k| k.as_slice())),
            None => Vec::new(),
        };
        let flexible = FlexibleBlock {
            data_checksum: self.checksum.clone().finalize(),
            max_entry_id: self.max_entry_id,
            filter: Bytes::from(filter),
        }
        .encode();

        let data_size = self.data_size as u32;
        let footer = Footer {
            min_key_size: self.min_entry.len() as u32,
            max_key_offset: data_size - self.last_entry.len() as u32,
            max_key_size: self.last_entry.len() as u32,
            data_blk_size: data_size,
            index_blk_size: index.len() as u32,
            flexible_blk_size: flexible.len() as u32,
        };

        let io_err = |e: std::io::Error| Error::file_io(format!("finish table: {}", e));
        self.writer.write_all(&index).map_err(io_err)?;
        self.writer.write_all(&flexible).map_err(io_err)?;
        self.writer.write_all(&footer.encode()).map_err(io_err)?;
        self.writer.flush().map_err(io_err)?;
        self.writer.get_ref().sync_all().map_err(io_err)?;

        Ok(TableSummary {
            path: self.path,
            num_entries: self.num_entries,
            num_blocks: self.offsets.len(),
            file_size: footer.file_size(),
            min_entry: self.min_entry,
            max_entry: self.last_entry,
            max_entry_id: self.max_entry_id,
        })
    }

    /// Get the number of entries added
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Bytes of data written so far.
    pub fn data_size(&self) -> u64 {
        self.data_size
    }
}

/// Writes `entries` (ascending storage order) to a new table at `path`.
pub fn write_table<P, E>(
    path: P,
    entries: &[E],
    block_size: usize,
    filter: Option<&BloomFilter>,
) -> Result<TableSummary>
where
    P: AsRef<Path>,
    E: AsRef<[u8]>,
{
    let mut builder = SstBuilder::new(path)?;
    builder.set_block_size(block_size);
    if let Some(policy) = filter {
        builder.set_filter(policy);
    }
    for entry in entries {
        builder.add(entry.as_ref())?;
    }
    builder.finish()
}
