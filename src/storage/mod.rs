//! File layer of a database directory.
//!
//! A database directory holds:
//! - `MANIFEST`: the level layout (see [`Manifest`]);
//! - `LOG`: the event log;
//! - `{id:016X}.tdb`: SST files.
//!
//! [`TableStore`] owns the directory, the reader pool and the table settings
//! (block size, bloom filter policy) and performs every read and write the
//! engine needs.

pub mod pool;

pub use pool::{BlockReader, PooledReader, ReaderPool};

use crate::arena::{Arena, BlockId, Slot};
use crate::compaction::manifest::Manifest;
use crate::error::{Error, Result};
use crate::filter::BloomFilter;
use crate::sstable::{self, TableMeta, TableSummary, TABLE_EXTENSION};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the manifest file.
pub const MANIFEST_FILE: &str = "MANIFEST";

/// Name of the event log file.
pub const LOG_FILE: &str = "LOG";

/// First line of a fresh event log.
pub const LOG_CREATED: &str = "Created new database.\n";

/// Reads and writes the files of one database directory.
pub struct TableStore {
    dir: PathBuf,
    pool: ReaderPool,
    block_size: usize,
    filter: Option<BloomFilter>,
}

impl TableStore {
    /// Opens `dir` (which must exist), creating `MANIFEST` and `LOG` when missing.
    pub fn open<P: AsRef<Path>>(
        dir: P,
        block_size: usize,
        filter: Option<BloomFilter>,
        pool_size: usize,
    ) -> Result<Self> {
        let store = Self {
            dir: dir.as_ref().to_path_buf(),
            pool: ReaderPool::new(pool_size),
            block_size,
            filter,
        };
        store.build_metadata_files()?;
        Ok(store)
    }

    /// Creates the metadata files of a fresh database. Existing files are kept.
    pub fn build_metadata_files(&self) -> Result<()> {
        let manifest = self.manifest_path();
        if !manifest.exists() {
            let initial = format!("{}\n{}", manifest.display(), self.log_path().display());
            write_file(&manifest, initial.as_bytes())?;
        }
        let log = self.log_path();
        if !log.exists() {
            write_file(&log, LOG_CREATED.as_bytes())?;
        }
        Ok(())
    }

    /// The database directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `MANIFEST`.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Path of `LOG`.
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    /// Path of the table with basename `name`.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, TABLE_EXTENSION))
    }

    /// The reader pool.
    pub fn pool(&self) -> &ReaderPool {
        &self.pool
    }

    /// The bloom filter policy, if filters are enabled.
    pub fn filter(&self) -> Option<&BloomFilter> {
        self.filter.as_ref()
    }

    /// Reads and parses `MANIFEST`.
    pub fn read_manifest(&self) -> Result<Manifest> {
        let mut reader = self.pool.acquire()?;
        let raw = reader.read_all(&self.manifest_path())?;
        let text = std::str::from_utf8(raw)
            .map_err(|_| Error::corruption("manifest is not valid UTF-8"))?;
        Manifest::decode(text)
    }

    /// Atomically replaces `MANIFEST` with `manifest`.
    pub fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let mut manifest = manifest.clone();
        manifest.manifest_path = self.manifest_path().display().to_string();
        manifest.log_path = self.log_path().display().to_string();

        let tmp = self.dir.join(format!("{}.tmp", MANIFEST_FILE));
        write_file(&tmp, manifest.encode().as_bytes())?;
        fs::rename(&tmp, self.manifest_path())
            .map_err(|e| Error::file_io(format!("install manifest: {}", e)))?;
        sync_dir(&self.dir)?;
        log::debug!("Manifest rewritten with {} files", manifest.all_files().count());
        Ok(())
    }

    /// Writes `entries` (ascending storage order) as table `name`.
    pub fn write_table<E: AsRef<[u8]>>(&self, name: &str, entries: &[E]) -> Result<TableSummary> {
        let summary =
            sstable::write_table(self.table_path(name), entries, self.block_size, self.filter())?;
        log::debug!(
            "Wrote table {} ({} entries, {} blocks, {} bytes)",
            name,
            summary.num_entries,
            summary.num_blocks,
            summary.file_size
        );
        Ok(summary)
    }

    /// Loads the in-memory description of table `name`.
    pub fn load_meta(&self, name: &str) -> Result<TableMeta> {
        let mut reader = self.pool.acquire()?;
        TableMeta::load(&mut reader, &self.table_path(name), name)
    }

    /// Point lookup in one table.
    pub fn get_from_table(&self, meta: &TableMeta, probe: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut reader = self.pool.acquire()?;
        meta.get(&mut reader, probe, self.filter())
    }

    /// Loads data block `block` of `meta` into a merge arena, reusing block id
    /// `reuse` when it is idle. The new block holds one reference.
    pub fn read_block_into(
        &self,
        meta: &TableMeta,
        block: usize,
        arena: &mut Arena,
        reuse: Option<BlockId>,
    ) -> Result<Slot> {
        let mut reader = self.pool.acquire()?;
        let raw = meta.read_block(&mut reader, block)?;
        let slot = match reuse.and_then(|id| arena.reallocate(raw.len(), id)) {
            Some(slot) => slot,
            None => arena
                .allocate(raw.len())
                .ok_or_else(|| Error::undefined("merge arena cannot allocate a block"))?,
        };
        arena
            .slice_mut(slot)
            .ok_or_else(|| Error::undefined("fresh merge block is not addressable"))?
            .copy_from_slice(raw);
        Ok(slot)
    }

    /// Checks the data checksum of table `meta`.
    pub fn verify_table(&self, meta: &TableMeta) -> Result<()> {
        let mut reader = self.pool.acquire()?;
        meta.verify_checksum(&mut reader)
    }

    /// Every entry of table `meta`.
    pub fn table_entries(&self, meta: &TableMeta) -> Result<Vec<Vec<u8>>> {
        let mut reader = self.pool.acquire()?;
        meta.entries(&mut reader)
    }

    /// Deletes table `name`. A file that is already gone is not an error.
    pub fn remove_table(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.table_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::file_io(format!("remove table {}: {}", name, e))),
        }
    }

    /// Basenames of every table file in the directory.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| Error::file_io(format!("list {}: {}", self.dir.display(), e)))?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if sstable::parse_table_name(stem).is_some() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| Error::file_io(format!("create {}: {}", path.display(), e)))?;
    file.write_all(contents)
        .and_then(|_| file.sync_all())
        .map_err(|e| Error::file_io(format!("write {}: {}", path.display(), e)))
}

// Makes a rename inside `dir` durable.
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::file_io(format!("sync {}: {}", dir.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::{encode_to_vec, entry_value, query_entry, OpType};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> TableStore {
        TableStore::open(dir.path(), 512, Some(BloomFilter::default()), 4).unwrap()
    }

    #[test]
    fn test_metadata_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let text = fs::read_to_string(store.manifest_path()).unwrap();
        assert_eq!(
            text,
            format!("{}\n{}", store.manifest_path().display(), store.log_path().display())
        );
        assert_eq!(fs::read_to_string(store.log_path()).unwrap(), LOG_CREATED);

        let manifest = store.read_manifest().unwrap();
        assert!(manifest.levels.is_empty());
    }

    #[test]
    fn test_manifest_rewrite() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut manifest = store.read_manifest().unwrap();
        manifest.levels = vec![vec!["0000000000000001".into()], vec![]];
        store.write_manifest(&manifest).unwrap();

        assert_eq!(store.read_manifest().unwrap(), manifest);
        // Reopening keeps the existing manifest.
        let reopened = TableStore::open(dir.path(), 512, None, 1).unwrap();
        assert_eq!(reopened.read_manifest().unwrap(), manifest);
    }

    #[test]
    fn test_manifest_rewrite_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut manifest = store.read_manifest().unwrap();
        for round in 0..3u64 {
            manifest.levels = vec![vec![sstable::table_name(round + 1)]];
            store.write_manifest(&manifest).unwrap();
        }

        assert!(!dir.path().join(format!("{}.tmp", MANIFEST_FILE)).exists());
        assert_eq!(store.read_manifest().unwrap().levels, vec![vec![sstable::table_name(3)]]);
        sync_dir(dir.path()).unwrap();
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_table_roundtrip_through_store() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let entries: Vec<Vec<u8>> = (0..100u32)
            .map(|i| encode_to_vec(format!("k{:03}", i).as_bytes(), &i.to_le_bytes(), u64::from(i), OpType::Insert))
            .collect();
        store.write_table("0000000000000007", &entries).unwrap();

        let meta = store.load_meta("0000000000000007").unwrap();
        store.verify_table(&meta).unwrap();
        assert_eq!(store.table_entries(&meta).unwrap(), entries);
        let hit = store.get_from_table(&meta, &query_entry(b"k042")).unwrap().unwrap();
        assert_eq!(entry_value(&hit), &42u32.to_le_bytes());
        assert_eq!(store.pool().available(), 4);

        assert_eq!(store.list_tables().unwrap(), vec!["0000000000000007".to_string()]);
        store.remove_table("0000000000000007").unwrap();
        store.remove_table("0000000000000007").unwrap();
        assert!(store.list_tables().unwrap().is_empty());
    }

    #[test]
    fn test_read_block_into_merge_arena() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let entries: Vec<Vec<u8>> = (0..100u32)
            .map(|i| encode_to_vec(format!("k{:03}", i).as_bytes(), b"v", u64::from(i), OpType::Insert))
            .collect();
        store.write_table("0000000000000001", &entries).unwrap();
        let meta = store.load_meta("0000000000000001").unwrap();

        let mut arena = Arena::for_merge();
        let first = store.read_block_into(&meta, 0, &mut arena, None).unwrap();
        assert_eq!(&arena.slice(first).unwrap()[..entries[0].len()], entries[0].as_slice());

        arena.unref(first.block);
        let second = store.read_block_into(&meta, 1, &mut arena, Some(first.block)).unwrap();
        assert_eq!(second.block, first.block);
        assert_eq!(arena.block_count(), 1);
    }
}
