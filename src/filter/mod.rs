//! Filter implementations for efficient key existence checking.
//!
//! This module provides filter implementations to speed up SSTable lookups
//! by quickly determining if a key is definitely not present.

pub mod bloom;
pub mod hash;

pub use bloom::BloomFilter;

/// Filter policy: builds a serialized filter from a key set and answers
/// membership queries against it.
pub trait Filter {
    /// Builds a filter over `keys`.
    fn create_filter<'a, I>(&self, keys: I) -> Vec<u8>
    where
        I: IntoIterator<Item = &'a [u8]>;

    /// Check if a key may exist (can have false positives)
    fn may_contain(&self, filter: &[u8], key: &[u8]) -> bool;
}
