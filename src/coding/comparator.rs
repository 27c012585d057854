//! Orderings over encoded internal entries.
//!
//! Two orders exist:
//! - storage order ([`InternalEntryComparator`]): user key bytes, then id
//!   ascending, so the newest version of a key sorts last;
//! - query order ([`QueryComparator`]): user key bytes only.
//!
//! In both, an entry whose first byte is 0 (or an empty slice) is a sentinel
//! that compares greater than every real entry. Real entries therefore never
//! have an empty key.

use crate::coding::internal_entry::{entry_id, entry_key};
use std::cmp::Ordering;

fn is_sentinel(entry: &[u8]) -> bool {
    entry.first().map_or(true, |&b| b == 0)
}

fn sentinel_order(a: &[u8], b: &[u8]) -> Option<Ordering> {
    match (is_sentinel(a), is_sentinel(b)) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Greater),
        (false, true) => Some(Ordering::Less),
        (false, false) => None,
    }
}

/// Comparison over encoded entries.
pub trait EntryComparator: Send + Sync {
    /// Total order between two entries.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Key equality; ids are ignored.
    fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        match sentinel_order(a, b) {
            Some(ord) => ord == Ordering::Equal,
            None => entry_key(a) == entry_key(b),
        }
    }

    /// `a < b`
    fn less(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// `a > b`
    fn greater(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Greater
    }

    /// `a <= b`
    fn less_or_equal(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) != Ordering::Greater
    }

    /// `a >= b`
    fn greater_or_equal(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) != Ordering::Less
    }
}

/// Storage order: key bytes, then id ascending.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalEntryComparator;

impl EntryComparator for InternalEntryComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        if let Some(ord) = sentinel_order(a, b) {
            return ord;
        }
        entry_key(a).cmp(entry_key(b)).then_with(|| entry_id(a).cmp(&entry_id(b)))
    }
}

/// Query order: key bytes only.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryComparator;

impl EntryComparator for QueryComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        if let Some(ord) = sentinel_order(a, b) {
            return ord;
        }
        entry_key(a).cmp(entry_key(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::internal_entry::{encode_to_vec, OpType};

    fn entry(key: &[u8], id: u64) -> Vec<u8> {
        encode_to_vec(key, b"v", id, OpType::Insert)
    }

    #[test]
    fn test_storage_order_breaks_ties_by_id() {
        let cmp = InternalEntryComparator;
        let older = entry(b"k", 5);
        let newer = entry(b"k", 9);
        assert!(cmp.less(&older, &newer));
        assert!(cmp.greater(&newer, &older));
        assert!(cmp.equal(&older, &newer));
        assert_eq!(cmp.compare(&older, &older), Ordering::Equal);
    }

    #[test]
    fn test_key_bytes_decide_first() {
        let cmp = InternalEntryComparator;
        assert!(cmp.less(&entry(b"a", 100), &entry(b"b", 1)));
        assert!(cmp.less(&entry(b"ab", 1), &entry(b"b", 1)));
        assert!(cmp.less(&entry(b"a", 1), &entry(b"ab", 1)));
    }

    #[test]
    fn test_query_order_ignores_id() {
        let cmp = QueryComparator;
        assert_eq!(cmp.compare(&entry(b"k", 1), &entry(b"k", 9)), Ordering::Equal);
        assert!(cmp.greater_or_equal(&entry(b"k", 1), &entry(b"k", 9)));
        assert!(cmp.less_or_equal(&entry(b"k", 9), &entry(b"k", 1)));
    }

    #[test]
    fn test_sentinel_is_greatest() {
        let sentinel = [0u8];
        for cmp in [&InternalEntryComparator as &dyn EntryComparator, &QueryComparator] {
            assert!(cmp.greater(&sentinel, &entry(b"zzzz", u64::MAX)));
            assert!(cmp.less(&entry(b"a", 0), &sentinel));
            assert!(cmp.equal(&sentinel, &[]));
            assert!(!cmp.equal(&sentinel, &entry(b"a", 0)));
        }
    }
}
