//! Manifest: which SST files make up each level.
//!
//! The manifest is stored as text:
//!
//! ```text
//! <path of MANIFEST>
//! <path of LOG>
//! <level 0 basenames joined by ';'>
//! <level 1 basenames joined by ';'>
//! ...
//! ```
//!
//! An empty level is an empty line. Level 0 files are in flush order (oldest
//! first) and may overlap; files of deeper levels are sorted by key range and
//! never overlap.

use crate::error::{Error, Result};

/// In-memory manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    /// Path of the manifest file itself.
    pub manifest_path: String,
    /// Path of the event log.
    pub log_path: String,
    /// Basenames per level.
    pub levels: Vec<Vec<String>>,
}

impl Manifest {
    /// Creates a manifest with no levels.
    pub fn new(manifest_path: impl Into<String>, log_path: impl Into<String>) -> Self {
        Self { manifest_path: manifest_path.into(), log_path: log_path.into(), levels: Vec::new() }
    }

    /// Serializes the manifest.
    pub fn encode(&self) -> String {
        let mut text = format!("{}\n{}\n", self.manifest_path, self.log_path);
        for level in &self.levels {
            text.push_str(&level.join(";"));
            text.push('\n');
        }
        text
    }

    /// Parses manifest text.
    pub fn decode(text: &str) -> Result<Self> {
        let mut lines = text.split_terminator('\n');
        let (Some(manifest_path), Some(log_path)) = (lines.next(), lines.next()) else {
            return Err(Error::corruption("manifest needs at least two lines"));
        };
        let levels = lines
            .map(|line| line.split(';').filter(|name| !name.is_empty()).map(str::to_string).collect())
            .collect();
        Ok(Self { manifest_path: manifest_path.to_string(), log_path: log_path.to_string(), levels })
    }

    /// Files at `level`; empty for levels that do not exist yet.
    pub fn level(&self, level: usize) -> &[String] {
        self.levels.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of files at `level`.
    pub fn level_len(&self, level: usize) -> usize {
        self.level(level).len()
    }

    /// Grows the level list so `level` exists.
    pub fn ensure_level(&mut self, level: usize) {
        if self.levels.len() <= level {
            self.levels.resize_with(level + 1, Vec::new);
        }
    }

    /// Every file in the manifest.
    pub fn all_files(&self) -> impl Iterator<Item = &String> {
        self.levels.iter().flatten()
    }

    /// Deepest level holding at least one file.
    pub fn deepest_populated_level(&self) -> Option<usize> {
        self.levels.iter().rposition(|files| !files.is_empty())
    }

    /// Applies the outcome of a compaction of `level`.
    ///
    /// `compacted` lists the `(level, index)` positions that were merged:
    /// entries of `level` are removed, entries of `level + 1` form the
    /// contiguous run `new_files` replaces. When no file of `level + 1` took
    /// part, `new_files` are inserted at `insert_index`.
    pub fn apply_compaction(
        &mut self,
        compacted: &[(usize, usize)],
        new_files: Vec<String>,
        level: usize,
        insert_index: usize,
    ) -> Result<()> {
        self.ensure_level(level + 1);

        let mut current: Vec<usize> =
            compacted.iter().filter(|(l, _)| *l == level).map(|(_, i)| *i).collect();
        current.sort_unstable();
        current.dedup();
        if current.last().is_some_and(|&i| i >= self.levels[level].len()) {
            return Err(Error::undefined(format!("compacted index out of range at level {}", level)));
        }

        let mut next: Vec<usize> =
            compacted.iter().filter(|(l, _)| *l == level + 1).map(|(_, i)| *i).collect();
        next.sort_unstable();
        next.dedup();
        let boundary = match (next.first(), next.last()) {
            (Some(&first), Some(&last)) => {
                if last - first + 1 != next.len() {
                    return Err(Error::undefined("compacted files of the next level are not contiguous"));
                }
                (first, last + 1)
            }
            _ => (insert_index, insert_index),
        };

        // Validate before mutating so a failure leaves the manifest untouched.
        if boundary.1 > self.levels[level + 1].len() {
            return Err(Error::undefined(format!(
                "boundary {:?} exceeds level {} size {}",
                boundary,
                level + 1,
                self.levels[level + 1].len()
            )));
        }
        for &i in current.iter().rev() {
            self.levels[level].remove(i);
        }
        rearrange_files(&mut self.levels[level + 1], boundary, new_files)
    }
}

/// Replaces `files[first..second]` with `new_files`. `first == second`
/// inserts without removing anything.
pub fn rearrange_files(
    files: &mut Vec<String>,
    boundary: (usize, usize),
    new_files: Vec<String>,
) -> Result<()> {
    let (first, second) = boundary;
    if first > second || second > files.len() {
        return Err(Error::undefined(format!(
            "malformed boundary ({}, {}) for {} files",
            first,
            second,
            files.len()
        )));
    }
    files.splice(first..second, new_files);
    Ok(())
}
