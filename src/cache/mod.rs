//! Value cache for SST lookups.
//!
//! Memtables are already in memory; only results read from SST files are
//! cached, so repeated reads of cold keys skip the block search.

mod lru;

pub use lru::{CacheStats, CachedValue, ValueCache};
