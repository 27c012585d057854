//! Compaction input selection.
//!
//! Given a starting file, the picker decides which files of `level` and
//! `level + 1` take part in the merge. Overlap is judged on user keys only.

use crate::coding::{EntryComparator, QueryComparator};
use crate::sstable::TableMeta;
use bytes::Bytes;

/// Files selected for one compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionInputs {
    /// Level being compacted.
    pub level: usize,
    /// Selected `(level, index)` positions, `level` files first.
    pub files: Vec<(usize, usize)>,
    /// Position in `level + 1` where output goes when nothing there overlaps.
    pub insert_index: usize,
    /// Smallest entry of the input key range.
    pub min_entry: Bytes,
    /// Largest entry of the input key range.
    pub max_entry: Bytes,
}

impl CompactionInputs {
    /// Number of selected files of `level + 1`.
    pub fn num_next_level_files(&self) -> usize {
        self.files.iter().filter(|(l, _)| *l == self.level + 1).count()
    }
}

/// Picks the inputs for compacting `tables[level][file_index]`.
///
/// `tables[l]` holds the metadata of level `l` in manifest order. At level 0
/// every other file whose range touches the growing input range joins, until
/// a pass adds nothing. Level `level + 1` is sorted, so the scan stops at the
/// first file entirely above the range.
pub fn pick_inputs(tables: &[Vec<&TableMeta>], level: usize, file_index: usize) -> Option<CompactionInputs> {
    let start = tables.get(level)?.get(file_index)?;
    let cmp = QueryComparator;

    let mut min_entry = start.min_entry.clone();
    let mut max_entry = start.max_entry.clone();
    let mut files = vec![(level, file_index)];

    if level == 0 {
        let mut chosen = vec![false; tables[0].len()];
        chosen[file_index] = true;
        loop {
            let mut grew = false;
            for (i, meta) in tables[0].iter().enumerate() {
                if chosen[i] || !meta.overlaps(&min_entry, &max_entry) {
                    continue;
                }
                chosen[i] = true;
                grew = true;
                if cmp.less(&meta.min_entry, &min_entry) {
                    min_entry = meta.min_entry.clone();
                }
                if cmp.greater(&meta.max_entry, &max_entry) {
                    max_entry = meta.max_entry.clone();
                }
            }
            if !grew {
                break;
            }
        }
        files = chosen.iter().enumerate().filter(|(_, c)| **c).map(|(i, _)| (0, i)).collect();
    }

    let next = tables.get(level + 1).map(Vec::as_slice).unwrap_or(&[]);
    let mut insert_index = next.len();
    for (i, meta) in next.iter().enumerate() {
        if cmp.less(&meta.max_entry, &min_entry) {
            continue;
        }
        if cmp.greater(&meta.min_entry, &max_entry) {
            insert_index = i;
            break;
        }
        files.push((level + 1, i));
    }

    Some(CompactionInputs { level, files, insert_index, min_entry, max_entry })
}
