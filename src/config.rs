//! Configuration for the TCDB storage engine.
//!
//! Two layers live here: [`Options`], the typed tuning knobs handed to
//! [`DB::open`](crate::DB::open), and [`Config`], a flat string key/value map
//! that can be loaded from a JSON file and names the database directory.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Key under which [`Config`] stores the database directory.
pub const DATABASE_DIR_KEY: &str = "database_dir";

/// Database directory used when the config does not name one.
pub const DEFAULT_DATABASE_DIR: &str = "./db";

/// Maximum number of levels in the tree.
pub const MAX_LEVELS: usize = 12;

/// Configuration options for opening a database.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Create the database if it doesn't exist.
    /// Default: true
    pub create_if_missing: bool,

    /// Error if the database already exists.
    /// Default: false
    pub error_if_exists: bool,

    /// Memtable memory usage (in bytes) that triggers a flush to level 0.
    /// Default: 4MB
    pub memtable_size: usize,

    /// Approximate size of the SST files written by compaction (in bytes).
    /// Default: 4MB
    pub sst_file_size: usize,

    /// Target size of an SST data block (in bytes).
    /// Default: 4KB
    pub block_size: usize,

    /// Size of the blocks the memtable arena carves entries from.
    /// Default: 4KB
    pub arena_block_size: usize,

    /// File count at which each level gets compacted into the next one.
    /// Default: 4, 10, 100, 1000, ... (one entry per level)
    pub level_sizes: Vec<u64>,

    /// Write a bloom filter into every SST.
    /// Default: true
    pub use_bloom_filter: bool,

    /// Bloom filter false positive rate.
    /// Default: 0.0082
    pub bloom_filter_fp_rate: f64,

    /// Number of pooled readers available for concurrent SST reads.
    /// Default: 16
    pub reader_pool_size: usize,

    /// Value cache capacity (in bytes). Set to 0 to disable caching.
    /// Default: 8MB
    pub value_cache_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            memtable_size: 4 * 1024 * 1024, // 4MB
            sst_file_size: 4 * 1024 * 1024, // 4MB
            block_size: 4 * 1024,           // 4KB
            arena_block_size: 4 * 1024,     // 4KB
            level_sizes: default_level_sizes(),
            use_bloom_filter: true,
            bloom_filter_fp_rate: 0.0082,
            reader_pool_size: 16,
            value_cache_size: 8 * 1024 * 1024, // 8MB
        }
    }
}

/// `4, 10, 100, 1000, ...` for [`MAX_LEVELS`] levels.
fn default_level_sizes() -> Vec<u64> {
    let mut sizes = vec![4];
    let mut size = 10u64;
    while sizes.len() < MAX_LEVELS {
        sizes.push(size);
        size = size.saturating_mul(10);
    }
    sizes
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds options from a [`Config`], starting from the defaults and
    /// overriding every tuning key the config carries.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut opts = Self::default();
        if let Some(v) = config.parse::<bool>("create_if_missing")? {
            opts.create_if_missing = v;
        }
        if let Some(v) = config.parse::<bool>("error_if_exists")? {
            opts.error_if_exists = v;
        }
        if let Some(v) = config.parse::<usize>("memtable_size")? {
            opts.memtable_size = v;
        }
        if let Some(v) = config.parse::<usize>("sst_file_size")? {
            opts.sst_file_size = v;
        }
        if let Some(v) = config.parse::<usize>("block_size")? {
            opts.block_size = v;
        }
        if let Some(v) = config.parse::<usize>("arena_block_size")? {
            opts.arena_block_size = v;
        }
        if let Some(v) = config.parse::<bool>("use_bloom_filter")? {
            opts.use_bloom_filter = v;
        }
        if let Some(v) = config.parse::<f64>("bloom_filter_fp_rate")? {
            opts.bloom_filter_fp_rate = v;
        }
        if let Some(v) = config.parse::<usize>("reader_pool_size")? {
            opts.reader_pool_size = v;
        }
        if let Some(v) = config.parse::<usize>("value_cache_size")? {
            opts.value_cache_size = v;
        }
        opts.validate()?;
        Ok(opts)
    }

    /// Sets whether to create the database if it doesn't exist.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether opening an existing database is an error.
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets the memtable flush threshold.
    pub fn memtable_size(mut self, size: usize) -> Self {
        self.memtable_size = size;
        self
    }

    /// Sets the approximate size of compaction output files.
    pub fn sst_file_size(mut self, size: usize) -> Self {
        self.sst_file_size = size;
        self
    }

    /// Sets the block size for SSTables.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the per-level file count thresholds.
    pub fn level_sizes(mut self, sizes: Vec<u64>) -> Self {
        self.level_sizes = sizes;
        self
    }

    /// Enables or disables bloom filters.
    pub fn use_bloom_filter(mut self, value: bool) -> Self {
        self.use_bloom_filter = value;
        self
    }

    /// Sets the reader pool size.
    pub fn reader_pool_size(mut self, size: usize) -> Self {
        self.reader_pool_size = size;
        self
    }

    /// Sets the value cache capacity.
    pub fn value_cache_size(mut self, size: usize) -> Self {
        self.value_cache_size = size;
        self
    }

    /// Number of levels in the tree.
    pub fn max_levels(&self) -> usize {
        self.level_sizes.len()
    }

    /// File count threshold of `level`.
    pub fn level_threshold(&self, level: usize) -> u64 {
        self.level_sizes.get(level).copied().unwrap_or(u64::MAX)
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.memtable_size == 0 {
            return Err(Error::bad_argument("memtable_size must be > 0"));
        }
        if self.sst_file_size == 0 {
            return Err(Error::bad_argument("sst_file_size must be > 0"));
        }
        if self.block_size == 0 {
            return Err(Error::bad_argument("block_size must be > 0"));
        }
        if self.arena_block_size == 0 {
            return Err(Error::bad_argument("arena_block_size must be > 0"));
        }
        if self.level_sizes.len() < 2 || self.level_sizes.len() > MAX_LEVELS {
            return Err(Error::bad_argument(format!(
                "level_sizes must describe between 2 and {} levels",
                MAX_LEVELS
            )));
        }
        if self.level_sizes.iter().any(|&s| s == 0) {
            return Err(Error::bad_argument("level sizes must be > 0"));
        }
        if self.bloom_filter_fp_rate <= 0.0 || self.bloom_filter_fp_rate >= 1.0 {
            return Err(Error::bad_argument("bloom_filter_fp_rate must be between 0 and 1"));
        }
        if self.reader_pool_size == 0 {
            return Err(Error::bad_argument("reader_pool_size must be > 0"));
        }
        Ok(())
    }
}

/// String key/value configuration.
///
/// ```rust,no_run
/// use tcdb::config::Config;
///
/// # fn main() -> Result<(), tcdb::Error> {
/// let config = Config::from_json_file("tcdb.json")?;
/// println!("database lives in {}", config.get("database_dir"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    /// Creates an empty config; `database_dir` falls back to `./db`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object of string values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON config file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::file_io(format!("cannot read config {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Sets `key` to `value`.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns the value stored under `key`, or an empty string when unset.
    /// `database_dir` defaults to `./db`.
    pub fn get(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(v) => v.clone(),
            None if key == DATABASE_DIR_KEY => DEFAULT_DATABASE_DIR.to_string(),
            None => String::new(),
        }
    }

    /// The configured database directory.
    pub fn database_dir(&self) -> String {
        self.get(DATABASE_DIR_KEY)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                Error::bad_argument(format!("config key {} has invalid value {:?}", key, raw))
            }),
        }
    }
}
