//! # TCDB - An Embedded LSM-Tree Key-Value Store
//!
//! TCDB stores byte-string keys and values in a single directory. Writes go to
//! an arena-backed memtable; full memtables are flushed to level-0 SST files,
//! and levels that reach their file-count threshold are merged into the next
//! level.
//!
//! ## Architecture
//!
//! - **MemTable**: skip list over arena-allocated internal entries
//! - **SSTable**: immutable sorted files with an index block, checksum and bloom filter
//! - **Manifest / VersionSet**: the level layout, persisted as text and reference counted in memory
//! - **Compaction**: multi-way merge of overlapping files into the next level
//! - **Value Cache**: LRU over values read from SST files
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tcdb::{DB, Options};
//!
//! # fn main() -> Result<(), tcdb::Error> {
//! let db = DB::open("./data", Options::default())?;
//!
//! db.insert(b"key1", b"value1")?;
//! db.insert(b"key2", b"value2")?;
//!
//! if let Some(value) = db.get(b"key1")? {
//!     println!("Found: {:?}", value);
//! }
//!
//! db.delete(b"key1")?;
//! db.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod arena;
pub mod cache;
pub mod coding;
pub mod compaction;
pub mod config;
pub mod error;
pub mod event_log;
pub mod filter;
pub mod memtable;
pub mod sstable;
pub mod storage;

// Re-exports
pub use config::{Config, Options};
pub use error::{Error, Result};

use bytes::Bytes;
use cache::{CacheStats, CachedValue, ValueCache};
use coding::{query_entry, EntryComparator, QueryComparator};
use compaction::{CompactionContext, CompactionJob, Manifest, VersionSet};
use event_log::EventLog;
use filter::BloomFilter;
use memtable::{Lookup, MemTable, WriteOutcome};
use parking_lot::{Mutex, RwLock};
use sstable::{parse_table_name, table_name, TableMeta};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use storage::{TableStore, MANIFEST_FILE};

struct DbState {
    memtable: Arc<MemTable>,
    next_file_id: u64,
}

/// The main database handle.
///
/// # Thread Safety
///
/// `DB` is `Send + Sync` and can be shared across threads with `Arc<DB>`.
/// Flushes and compactions run on the writing thread that triggers them and
/// are serialized with each other; readers are never blocked by them.
pub struct DB {
    /// Configuration options
    options: Options,

    /// Directory access: tables, manifest, reader pool
    store: TableStore,

    /// The `LOG` file
    event_log: EventLog,

    /// Current memtable and file id counter
    state: Mutex<DbState>,

    /// Frozen memtable being written to level 0
    immutable: RwLock<Option<Arc<MemTable>>>,

    /// Live manifest versions
    versions: VersionSet,

    /// Metadata of live tables by basename
    tables: RwLock<HashMap<String, Arc<TableMeta>>>,

    /// Values read from tables
    value_cache: ValueCache,

    /// Serializes flush and compaction
    flush_lock: Mutex<()>,
}

impl DB {
    /// Opens a database at the specified path with the given options.
    ///
    /// A fresh directory gets a `MANIFEST` and a `LOG`. An existing one is
    /// recovered: the manifest is read, the file and entry id counters resume
    /// after the highest ids on disk, and table files the manifest does not
    /// mention are deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The options are invalid
    /// - The directory is missing and `create_if_missing` is off, or exists
    ///   and `error_if_exists` is on
    /// - The manifest or a table it lists cannot be read
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tcdb::{DB, Options};
    ///
    /// # fn main() -> Result<(), tcdb::Error> {
    /// let options = Options::default().memtable_size(1 << 20);
    /// let db = DB::open("./my_database", options)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        options.validate()?;
        let dir = path.as_ref();

        if dir.join(MANIFEST_FILE).exists() {
            if options.error_if_exists {
                return Err(Error::bad_argument(format!(
                    "database already exists: {}",
                    dir.display()
                )));
            }
        } else if !dir.exists() {
            if !options.create_if_missing {
                return Err(Error::bad_argument(format!(
                    "database directory does not exist: {}",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::file_io(format!("create {}: {}", dir.display(), e)))?;
        }

        let filter =
            options.use_bloom_filter.then(|| BloomFilter::new(options.bloom_filter_fp_rate));
        let store = TableStore::open(dir, options.block_size, filter, options.reader_pool_size)?;
        let event_log = EventLog::open(store.log_path())?;
        let manifest = store.read_manifest()?;

        let live: HashSet<&String> = manifest.all_files().collect();
        let mut tables = HashMap::with_capacity(live.len());
        let mut max_entry_id: Option<u64> = None;
        for name in &live {
            let meta = store.load_meta(name)?;
            max_entry_id = max_entry_id.max(Some(meta.flexible.max_entry_id));
            tables.insert(name.to_string(), Arc::new(meta));
        }

        let on_disk = store.list_tables()?;
        let max_file_id = live
            .iter()
            .map(|name| name.as_str())
            .chain(on_disk.iter().map(String::as_str))
            .filter_map(parse_table_name)
            .max();
        for orphan in on_disk.iter().filter(|name| !live.contains(name)) {
            store.remove_table(orphan)?;
            event_log.warn(&format!("Removed orphan table {}", orphan));
        }

        let next_file_id = max_file_id.map_or(1, |id| id + 1);
        let next_entry_id = max_entry_id.map_or(0, |id| id + 1);
        log::info!(
            "Opened database at {} with {} tables (next file id {}, next entry id {})",
            dir.display(),
            tables.len(),
            next_file_id,
            next_entry_id
        );
        event_log.info(&format!("Opened database with {} tables.", tables.len()));

        let versions = VersionSet::new();
        versions.install(manifest)?;

        Ok(DB {
            state: Mutex::new(DbState {
                memtable: Arc::new(MemTable::new(next_entry_id, options.arena_block_size)),
                next_file_id,
            }),
            immutable: RwLock::new(None),
            versions,
            tables: RwLock::new(tables),
            value_cache: ValueCache::new(options.value_cache_size),
            flush_lock: Mutex::new(()),
            store,
            event_log,
            options,
        })
    }

    /// Opens the database named by `config`'s `database_dir`, with options
    /// taken from the same config.
    pub fn open_with_config(config: &Config) -> Result<Self> {
        let options = Options::from_config(config)?;
        Self::open(config.database_dir(), options)
    }

    /// Inserts a key-value pair into the database.
    ///
    /// If the key already exists, its value will be overwritten. When the
    /// memtable reaches `memtable_size` it is flushed to level 0 before this
    /// call returns.
    ///
    /// # Errors
    ///
    /// Returns `BadArgument` for an empty key, or the error of a triggered
    /// flush or compaction.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tcdb::{DB, Options};
    /// # fn main() -> Result<(), tcdb::Error> {
    /// # let db = DB::open("./data", Options::default())?;
    /// db.insert(b"key", b"value")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        self.write(|memtable| memtable.insert(key, value))
    }

    /// Deletes a key from the database.
    ///
    /// This operation is implemented as a tombstone marker.
    /// The actual data is removed during compaction.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        check_key(key)?;
        self.write(|memtable| memtable.delete(key))
    }

    fn write<F>(&self, op: F) -> Result<()>
    where
        F: Fn(&MemTable) -> Result<WriteOutcome>,
    {
        loop {
            let memtable = Arc::clone(&self.state.lock().memtable);
            match op(&memtable)? {
                WriteOutcome::Applied => {
                    if memtable.mem_usage() >= self.options.memtable_size {
                        self.flush_memtable(false)?;
                    }
                    return Ok(());
                }
                // Lost a race with a flush; the new table is already installed.
                WriteOutcome::Frozen => continue,
            }
        }
    }

    /// Retrieves the value associated with a key.
    ///
    /// Returns `None` if the key does not exist or has been deleted.
    ///
    /// Sources are searched newest first: the current memtable, the memtable
    /// being flushed, the value cache, level 0 from the newest file down, then
    /// each deeper level. The first entry found decides.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tcdb::{DB, Options};
    /// # fn main() -> Result<(), tcdb::Error> {
    /// # let db = DB::open("./data", Options::default())?;
    /// if let Some(value) = db.get(b"key")? {
    ///     println!("Found: {:?}", value);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        check_key(key)?;

        let memtable = Arc::clone(&self.state.lock().memtable);
        match memtable.lookup(key)? {
            Lookup::Missing => {}
            found => return Ok(found.into_value()),
        }
        let immutable = self.immutable.read().clone();
        if let Some(immutable) = immutable {
            match immutable.lookup(key)? {
                Lookup::Missing => {}
                found => return Ok(found.into_value()),
            }
        }

        match self.value_cache.get(key) {
            Some(CachedValue::Value(value)) => return Ok(Some(value.to_vec())),
            Some(CachedValue::Deleted) => return Ok(None),
            None => {}
        }

        // The generation is read before the version so a fill based on a
        // superseded version is refused.
        let generation = self.value_cache.generation();
        let version = self.versions.current()?;
        let lookup = match self.search_tables(version.manifest(), key)? {
            Some(entry) => Lookup::from_entry(&entry),
            None => Lookup::Missing,
        };
        drop(version);

        let cached = match &lookup {
            Lookup::Found(value) => Some(CachedValue::Value(Bytes::copy_from_slice(value))),
            Lookup::Deleted => Some(CachedValue::Deleted),
            Lookup::Missing => None,
        };
        if let Some(cached) = cached {
            self.value_cache.insert_if_generation(key.to_vec(), cached, generation);
        }
        Ok(lookup.into_value())
    }

    /// Whether `key` currently has a value.
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn search_tables(&self, manifest: &Manifest, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let probe = query_entry(key);

        // Level 0 files may overlap; later files are newer.
        for name in manifest.level(0).iter().rev() {
            let meta = self.table(name)?;
            if let Some(entry) = self.store.get_from_table(&meta, &probe)? {
                return Ok(Some(entry));
            }
        }

        let cmp = QueryComparator;
        for level in 1..manifest.levels.len() {
            let metas =
                manifest.level(level).iter().map(|name| self.table(name)).collect::<Result<Vec<_>>>()?;
            // Deeper levels are sorted and disjoint: at most one file can hold the key.
            let idx = metas.partition_point(|meta| cmp.less(&meta.max_entry, &probe));
            if let Some(meta) = metas.get(idx).filter(|meta| meta.contains(&probe)) {
                if let Some(entry) = self.store.get_from_table(meta, &probe)? {
                    return Ok(Some(entry));
                }
            }
        }
        Ok(None)
    }

    /// Manually flushes the current MemTable to a level-0 SST.
    ///
    /// Does nothing when the memtable is empty.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tcdb::{DB, Options};
    /// # fn main() -> Result<(), tcdb::Error> {
    /// # let db = DB::open("./data", Options::default())?;
    /// db.insert(b"key", b"value")?;
    /// db.flush()?; // Manually flush to disk
    /// # Ok(())
    /// # }
    /// ```
    pub fn flush(&self) -> Result<()> {
        self.flush_memtable(true).map(|_| ())
    }

    /// Flushes outstanding writes and closes the database.
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    /// Freezes the current memtable, swaps in a fresh one and writes the
    /// frozen one to level 0. Without `force` this only happens if the table
    /// is still over the size threshold once the flush lock is held. Returns
    /// whether a table was written.
    fn flush_memtable(&self, force: bool) -> Result<bool> {
        let _flush = self.flush_lock.lock();

        // A previous flush that failed left its table in the immutable slot.
        let pending = self.immutable.read().clone();
        let mut written = false;
        if let Some(pending) = pending {
            self.write_level0(&pending)?;
            written = true;
        }

        let frozen = {
            let mut state = self.state.lock();
            let current = Arc::clone(&state.memtable);
            if current.is_empty() || (!force && current.mem_usage() < self.options.memtable_size) {
                return Ok(written);
            }
            // Frozen first, so the id counter is final when the successor is seeded.
            current.freeze();
            state.memtable =
                Arc::new(MemTable::new(current.next_id(), self.options.arena_block_size));
            *self.immutable.write() = Some(Arc::clone(&current));
            current
        };
        log::info!(
            "MemTable frozen at {} bytes with {} entries",
            frozen.mem_usage(),
            frozen.len()
        );

        self.write_level0(&frozen)?;
        Ok(true)
    }

    fn write_level0(&self, frozen: &MemTable) -> Result<()> {
        let mut manifest = self.versions.current()?.manifest().clone();

        if manifest.level_len(0) as u64 >= self.options.level_threshold(0) {
            let job = CompactionJob::new(&self.store, self, &self.options);
            for result in job.background_compact(&mut manifest)? {
                self.event_log.info(&format!(
                    "Compacted {} files of level {} into {} files.",
                    result.inputs.len(),
                    result.level,
                    result.outputs.len()
                ));
            }
        }

        let entries = frozen.entry_set();
        if !entries.is_empty() {
            let name = self.next_table_name();
            let summary = self.store.write_table(&name, &entries)?;
            manifest.ensure_level(0);
            manifest.levels[0].push(name.clone());
            self.install(&manifest)?;
            self.event_log.info(&format!(
                "Flushed memtable to {} ({} entries, {} bytes).",
                name, summary.num_entries, summary.file_size
            ));
        }

        // Only after the new version is visible to readers.
        *self.immutable.write() = None;
        Ok(())
    }

    /// Runs the compaction cascade now, regardless of the level-0 file count.
    pub fn compact(&self) -> Result<()> {
        let _flush = self.flush_lock.lock();
        let mut manifest = self.versions.current()?.manifest().clone();
        let job = CompactionJob::new(&self.store, self, &self.options);
        let results = job.background_compact(&mut manifest)?;
        log::info!("Manual compaction ran {} merges", results.len());
        Ok(())
    }

    fn remove_obsolete_files(&self) {
        let obsolete = self.versions.take_obsolete();
        if obsolete.is_empty() {
            return;
        }
        let mut tables = self.tables.write();
        for name in obsolete {
            tables.remove(&name);
            if let Err(e) = self.store.remove_table(&name) {
                self.event_log.warn(&format!("Could not remove table {}: {}", name, e));
            } else {
                log::debug!("Removed obsolete table {}", name);
            }
        }
    }

    /// Basenames of the files at `level`, in manifest order.
    pub fn level_files(&self, level: usize) -> Result<Vec<String>> {
        Ok(self.versions.current()?.manifest().level(level).to_vec())
    }

    /// Number of files at `level`.
    pub fn num_files_at_level(&self, level: usize) -> Result<usize> {
        Ok(self.versions.current()?.manifest().level_len(level))
    }

    /// A copy of the current manifest.
    pub fn manifest(&self) -> Result<Manifest> {
        Ok(self.versions.current()?.manifest().clone())
    }

    /// Value cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.value_cache.stats()
    }

    /// The database directory.
    pub fn path(&self) -> &Path {
        self.store.dir()
    }

    /// Options the database was opened with.
    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl CompactionContext for DB {
    fn table(&self, name: &str) -> Result<Arc<TableMeta>> {
        if let Some(meta) = self.tables.read().get(name) {
            return Ok(Arc::clone(meta));
        }
        let meta = Arc::new(self.store.load_meta(name)?);
        self.tables.write().entry(name.to_string()).or_insert_with(|| Arc::clone(&meta));
        Ok(meta)
    }

    fn next_table_name(&self) -> String {
        let mut state = self.state.lock();
        let id = state.next_file_id;
        state.next_file_id += 1;
        table_name(id)
    }

    fn install(&self, manifest: &Manifest) -> Result<()> {
        self.store.write_manifest(manifest)?;
        self.versions.install(manifest.clone())?;
        self.value_cache.invalidate();
        self.remove_obsolete_files();
        Ok(())
    }
}

impl Drop for DB {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("Failed to flush memtable on close: {}", e);
            self.event_log.error(&format!("Failed to flush memtable on close: {}", e));
        }
    }
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::bad_argument("key must not be empty"));
    }
    Ok(())
}
