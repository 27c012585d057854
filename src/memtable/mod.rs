//! # MemTable - In-Memory Sorted Table
//!
//! The MemTable buffers recent writes. Each write is encoded as an internal
//! entry, copied into an arena and indexed by a skip list ordered by storage
//! order (key, then id), so all versions of a key sit next to each other with
//! the newest last.
//!
//! ## Thread Safety
//!
//! One mutex guards the skip list, the arena and the id counter; it is held for
//! the duration of a single operation. Once [`MemTable::freeze`] has been
//! called, writes are refused so a table handed to the flush path never
//! changes again.

pub mod skiplist;

pub use skiplist::SkipList;

use crate::arena::{Arena, Slot};
use crate::coding::{
    encode_internal, encoded_len, entry_op_type, entry_value, query_entry, EntryComparator,
    InternalEntryComparator, OpType,
};
use crate::error::{Error, Result};
use parking_lot::Mutex;

/// Result of a point lookup that keeps tombstones visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Newest version is a write with this value.
    Found(Vec<u8>),
    /// Newest version is a tombstone.
    Deleted,
    /// The key has no version here.
    Missing,
}

impl Lookup {
    /// Collapses the lookup into the value a reader sees.
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Deleted | Lookup::Missing => None,
        }
    }

    /// Decodes a stored entry into a lookup result.
    pub fn from_entry(entry: &[u8]) -> Self {
        match entry_op_type(entry) {
            OpType::Insert => Lookup::Found(entry_value(entry).to_vec()),
            OpType::Delete => Lookup::Deleted,
        }
    }
}

/// Whether a write reached the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The entry was indexed.
    Applied,
    /// The table is frozen; retry against the current table.
    Frozen,
}

struct Inner {
    arena: Arena,
    index: SkipList<Slot>,
    next_id: u64,
    frozen: bool,
}

impl Inner {
    fn entry(&self, slot: Slot) -> &[u8] {
        self.arena.slice(slot).unwrap_or_default()
    }
}

/// Arena-backed write buffer.
///
/// # Example
///
/// ```rust
/// use tcdb::memtable::MemTable;
///
/// let memtable = MemTable::new(0, 4096);
/// memtable.insert(b"key1", b"value1").unwrap();
/// assert_eq!(memtable.get(b"key1").unwrap(), Some(b"value1".to_vec()));
/// ```
pub struct MemTable {
    inner: Mutex<Inner>,
}

impl MemTable {
    /// Creates an empty table whose first entry gets id `next_id`.
    pub fn new(next_id: u64, arena_block_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                arena: Arena::for_memtable(arena_block_size),
                index: SkipList::new(),
                next_id,
                frozen: false,
            }),
        }
    }

    /// Records `key = value`.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<WriteOutcome> {
        self.write(key, value, OpType::Insert)
    }

    /// Records a tombstone for `key`.
    pub fn delete(&self, key: &[u8]) -> Result<WriteOutcome> {
        self.write(key, &[], OpType::Delete)
    }

    fn write(&self, key: &[u8], value: &[u8], op: OpType) -> Result<WriteOutcome> {
        if key.is_empty() {
            return Err(Error::bad_argument("key cannot be empty"));
        }
        let mut inner = self.inner.lock();
        if inner.frozen {
            return Ok(WriteOutcome::Frozen);
        }

        let size = encoded_len(key, value, op);
        let slot = inner
            .arena
            .allocate(size)
            .ok_or_else(|| Error::undefined(format!("memtable arena cannot allocate {} bytes", size)))?;
        let id = inner.next_id;
        let dest = inner
            .arena
            .slice_mut(slot)
            .ok_or_else(|| Error::undefined("freshly allocated slot is not addressable"))?;
        encode_internal(key, value, id, op, dest)?;
        inner.next_id += 1;

        let Inner { arena, index, .. } = &mut *inner;
        let cmp = InternalEntryComparator;
        index.insert(slot, |a, b| {
            cmp.compare(arena.slice(*a).unwrap_or_default(), arena.slice(*b).unwrap_or_default())
        });
        Ok(WriteOutcome::Applied)
    }

    /// Newest version of `key`, tombstones included.
    pub fn lookup(&self, key: &[u8]) -> Result<Lookup> {
        if key.is_empty() {
            return Err(Error::bad_argument("key cannot be empty"));
        }
        let probe = query_entry(key);
        let inner = self.inner.lock();
        let cmp = InternalEntryComparator;
        let found = inner.index.get(
            probe.as_slice(),
            |slot, probe| cmp.compare(inner.entry(*slot), probe),
            |slot, probe| cmp.equal(inner.entry(*slot), probe),
        );
        Ok(match found {
            Some(slot) => Lookup::from_entry(inner.entry(*slot)),
            None => Lookup::Missing,
        })
    }

    /// Value of `key`, or `None` when it is missing or deleted.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.lookup(key)?.into_value())
    }

    /// Whether `key` currently has a value.
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(matches!(self.lookup(key)?, Lookup::Found(_)))
    }

    /// Refuses all further writes.
    pub fn freeze(&self) {
        self.inner.lock().frozen = true;
    }

    /// Whether [`MemTable::freeze`] has been called.
    pub fn is_frozen(&self) -> bool {
        self.inner.lock().frozen
    }

    /// Arena memory in use.
    pub fn mem_usage(&self) -> usize {
        self.inner.lock().arena.mem_usage()
    }

    /// Id the next write will get; seeds the successor table.
    pub fn next_id(&self) -> u64 {
        self.inner.lock().next_id
    }

    /// Number of entries, every version counted.
    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies out the newest entry of every key, in storage order.
    pub fn entry_set(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock();
        let cmp = InternalEntryComparator;
        let mut entries: Vec<Vec<u8>> = Vec::with_capacity(inner.index.len());
        for slot in inner.index.iter() {
            let entry = inner.entry(*slot);
            match entries.last_mut() {
                // Versions of a key are adjacent and ascending, so the last one wins.
                Some(last) if cmp.equal(last, entry) => *last = entry.to_vec(),
                _ => entries.push(entry.to_vec()),
            }
        }
        entries
    }

    /// Checks the index order; used by tests.
    pub fn is_sorted(&self) -> bool {
        let inner = self.inner.lock();
        let cmp = InternalEntryComparator;
        inner.index.is_ascending(|a, b| cmp.compare(inner.entry(*a), inner.entry(*b)))
    }
}
