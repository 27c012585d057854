//! LRU cache over values read from SST files.
//!
//! Entries are keyed by user key and sized as `key.len() + value.len()`.
//! Every change of the table layout bumps the cache generation and drops all
//! entries; a reader that looked a value up under an older generation cannot
//! put it back (see [`ValueCache::insert_if_generation`]).

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// What the tables say about a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    /// The newest entry is an insert of this value.
    Value(Bytes),
    /// The newest entry is a delete.
    Deleted,
}

impl CachedValue {
    fn charge(&self) -> usize {
        match self {
            CachedValue::Value(v) => v.len(),
            CachedValue::Deleted => 1,
        }
    }
}

/// Statistics for cache performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Total number of cache lookups
    pub lookups: u64,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of insertions
    pub insertions: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Insertions refused because the generation moved on.
    pub stale_fills: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }

    /// Reset all statistics to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Vec<u8>, CachedValue>,
    // Most recently used at the back.
    order: VecDeque<Vec<u8>>,
    size: usize,
    stats: CacheStats,
}

impl Inner {
    fn touch(&mut self, key: &[u8]) {
        if let Some(pos) = self.order.iter().position(|k| k.as_slice() == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &[u8]) {
        if let Some(old) = self.entries.remove(key) {
            self.size -= key.len() + old.charge();
            self.order.retain(|k| k.as_slice() != key);
        }
    }

    fn evict_one(&mut self) -> bool {
        let Some(key) = self.order.pop_front() else {
            return false;
        };
        if let Some(old) = self.entries.remove(&key) {
            self.size -= key.len() + old.charge();
            self.stats.evictions += 1;
        }
        true
    }
}

/// Thread-safe LRU cache of SST lookup results.
///
/// ```
/// use bytes::Bytes;
/// use tcdb::cache::{CachedValue, ValueCache};
///
/// let cache = ValueCache::new(1024);
/// let generation = cache.generation();
/// cache.insert_if_generation(b"key".to_vec(), CachedValue::Value(Bytes::from_static(b"v")), generation);
/// assert!(cache.get(b"key").is_some());
/// ```
pub struct ValueCache {
    capacity: usize,
    generation: AtomicU64,
    inner: Mutex<Inner>,
}

impl ValueCache {
    /// Creates a cache holding at most `capacity` bytes. 0 disables it.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, generation: AtomicU64::new(0), inner: Mutex::new(Inner::default()) }
    }

    /// Looks `key` up and marks it most recently used.
    pub fn get(&self, key: &[u8]) -> Option<CachedValue> {
        let mut inner = self.inner.lock();
        inner.stats.lookups += 1;
        match inner.entries.get(key).cloned() {
            Some(value) => {
                inner.stats.hits += 1;
                inner.touch(key);
                Some(value)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Current generation. Read it before looking in the tables.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Caches `value` unless the generation changed since `generation` was
    /// read. Returns whether the value was stored.
    pub fn insert_if_generation(&self, key: Vec<u8>, value: CachedValue, generation: u64) -> bool {
        let charge = key.len() + value.charge();
        if self.capacity == 0 || charge > self.capacity {
            return false;
        }

        let mut inner = self.inner.lock();
        // Checked under the lock so a concurrent invalidate cannot interleave.
        if self.generation.load(Ordering::Acquire) != generation {
            inner.stats.stale_fills += 1;
            return false;
        }
        inner.remove(&key);
        while inner.size + charge > self.capacity {
            if !inner.evict_one() {
                break;
            }
        }
        inner.size += charge;
        inner.order.push_back(key.clone());
        inner.entries.insert(key, value);
        inner.stats.insertions += 1;
        true
    }

    /// Drops every entry and starts a new generation.
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        inner.entries.clear();
        inner.order.clear();
        inner.size = 0;
    }

    /// Get current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    /// Reset cache statistics to zero.
    pub fn reset_stats(&self) {
        self.inner.lock().stats.reset();
    }

    /// Bytes currently charged.
    pub fn size(&self) -> usize {
        self.inner.lock().size
    }

    /// Get the cache capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
