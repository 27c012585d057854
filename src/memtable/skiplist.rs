//! Index-based skip list.
//!
//! Nodes live in a `Vec` and link to each other by index, so the structure
//! needs no unsafe code and nodes are never freed individually. The list does
//! not own a comparator: every operation takes the ordering as a closure,
//! which lets the memtable compare arena slots against a probe that lives
//! outside the arena.
//!
//! ```text
//! Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
//! Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
//! Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
//! ```

use rand::Rng;
use std::cmp::Ordering;

/// Maximum height of a node.
pub const MAX_HEIGHT: usize = 12;

/// One in `BRANCHING` nodes is promoted to the next level.
const BRANCHING: u32 = 4;

const HEAD: usize = 0;

/// Tail sentinel.
const NIL: usize = usize::MAX;

struct Node<K> {
    key: Option<K>,
    next: Vec<usize>,
}

/// A probabilistic sorted list. Duplicate keys are kept as distinct nodes;
/// a new key is placed before the nodes it compares equal to.
pub struct SkipList<K> {
    nodes: Vec<Node<K>>,
    height: usize,
    len: usize,
}

impl<K> Default for SkipList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> SkipList<K> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self { nodes: vec![Node { key: None, next: vec![NIL; MAX_HEIGHT] }], height: 1, len: 0 }
    }

    /// Number of inserted keys.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels currently in use.
    pub fn height(&self) -> usize {
        self.height
    }

    fn random_height() -> usize {
        let mut rng = rand::rng();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.random_ratio(1, BRANCHING) {
            height += 1;
        }
        height
    }

    fn key_at(&self, node: usize) -> Option<&K> {
        self.nodes.get(node).and_then(|n| n.key.as_ref())
    }

    /// Walks down from the top level and returns, for each level, the last node
    /// whose key orders strictly before `probe`.
    fn find_predecessors<Q: ?Sized, F>(&self, probe: &Q, cmp: &F) -> [usize; MAX_HEIGHT]
    where
        F: Fn(&K, &Q) -> Ordering,
    {
        let mut preds = [HEAD; MAX_HEIGHT];
        let mut node = HEAD;
        for level in (0..self.height).rev() {
            loop {
                let next = self.nodes[node].next[level];
                match self.key_at(next) {
                    Some(key) if cmp(key, probe) == Ordering::Less => node = next,
                    _ => break,
                }
            }
            preds[level] = node;
        }
        preds
    }

    /// Inserts `key` in the position given by `cmp`.
    pub fn insert<F>(&mut self, key: K, cmp: F)
    where
        F: Fn(&K, &K) -> Ordering,
    {
        let preds = self.find_predecessors(&key, &cmp);
        let height = Self::random_height();
        if height > self.height {
            // Levels above the old height start from the head, which `preds`
            // already holds.
            self.height = height;
        }

        let id = self.nodes.len();
        let mut next = vec![NIL; height];
        for (level, slot) in next.iter_mut().enumerate() {
            *slot = self.nodes[preds[level]].next[level];
        }
        self.nodes.push(Node { key: Some(key), next });
        for (level, &pred) in preds.iter().enumerate().take(height) {
            self.nodes[pred].next[level] = id;
        }
        self.len += 1;
    }

    /// Returns the last key ordering strictly before `probe`, provided `eq`
    /// says it matches the probe.
    ///
    /// Probes carry the largest possible version, so the node found is the
    /// newest version of the probed key.
    pub fn get<Q: ?Sized, F, E>(&self, probe: &Q, cmp: F, eq: E) -> Option<&K>
    where
        F: Fn(&K, &Q) -> Ordering,
        E: Fn(&K, &Q) -> bool,
    {
        let before = self.find_predecessors(probe, &cmp)[0];
        self.key_at(before).filter(|key| eq(key, probe))
    }

    /// Iterates the keys in order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter { list: self, node: self.nodes[HEAD].next[0] }
    }

    /// Checks that adjacent keys never descend under `cmp`.
    pub fn is_ascending<F>(&self, cmp: F) -> bool
    where
        F: Fn(&K, &K) -> Ordering,
    {
        let mut iter = self.iter();
        let Some(mut prev) = iter.next() else {
            return true;
        };
        for key in iter {
            if cmp(prev, key) == Ordering::Greater {
                return false;
            }
            prev = key;
        }
        true
    }
}

/// In-order iterator over a [`SkipList`].
pub struct Iter<'a, K> {
    list: &'a SkipList<K>,
    node: usize,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.nodes.get(self.node)?;
        self.node = node.next[0];
        node.key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn by_value(a: &u32, b: &u32) -> Ordering {
        a.cmp(b)
    }

    #[test]
    fn test_empty_list() {
        let list: SkipList<u32> = SkipList::new();
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
        assert!(list.get(&5, by_value, |a, b| a == b).is_none());
        assert!(list.is_ascending(by_value));
    }

    #[test]
    fn test_random_inserts_stay_sorted() {
        let mut values: Vec<u32> = (0..2000).collect();
        values.shuffle(&mut rand::rng());

        let mut list = SkipList::new();
        for v in &values {
            list.insert(*v, by_value);
        }

        assert_eq!(list.len(), 2000);
        assert!(list.is_ascending(by_value));
        let collected: Vec<u32> = list.iter().copied().collect();
        assert_eq!(collected, (0..2000).collect::<Vec<_>>());
        assert!(list.height() <= MAX_HEIGHT);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut list = SkipList::new();
        for v in [3, 1, 3, 2, 3] {
            list.insert(v, by_value);
        }
        assert_eq!(list.len(), 5);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 3, 3]);
    }

    #[test]
    fn test_get_returns_last_node_before_probe() {
        // (key, version) pairs; the probe uses version u32::MAX.
        let mut list = SkipList::new();
        for pair in [(1u32, 1u32), (2, 1), (2, 5), (2, 3), (4, 1)] {
            list.insert(pair, |a: &(u32, u32), b: &(u32, u32)| a.cmp(b));
        }

        let cmp = |a: &(u32, u32), b: &(u32, u32)| a.cmp(b);
        let eq = |a: &(u32, u32), b: &(u32, u32)| a.0 == b.0;
        assert_eq!(list.get(&(2, u32::MAX), cmp, eq), Some(&(2, 5)));
        assert_eq!(list.get(&(4, u32::MAX), cmp, eq), Some(&(4, 1)));
        assert_eq!(list.get(&(3, u32::MAX), cmp, eq), None);
        assert_eq!(list.get(&(0, u32::MAX), cmp, eq), None);
    }
}
