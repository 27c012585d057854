//! Compaction: merging SST files from one level into the next.
//!
//! ## Levels
//!
//! - Level 0: tables flushed from memtables, in flush order; ranges may overlap
//! - Level 1+: key-sorted, non-overlapping tables
//!
//! A level is compacted when its file count reaches its threshold in
//! [`Options::level_sizes`]. The last level is never compacted.
//!
//! ## Process
//!
//! 1. Pick the input files (picker.rs)
//! 2. Merge them into new tables of about `sst_file_size` bytes (merge.rs)
//! 3. Splice the outputs into the manifest (manifest.rs)
//! 4. Persist and install the new version (version.rs); files no version
//!    refers to any more are deleted by the database

pub mod manifest;
pub mod merge;
pub mod picker;
pub mod version;

pub use manifest::{rearrange_files, Manifest};
pub use merge::{MergeOutput, MultiwayMerge};
pub use picker::{pick_inputs, CompactionInputs};
pub use version::{Version, VersionRef, VersionSet};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::sstable::TableMeta;
use crate::storage::TableStore;
use std::sync::Arc;

/// What a compaction needs from the database around it.
pub trait CompactionContext {
    /// Metadata of a live table.
    fn table(&self, name: &str) -> Result<Arc<TableMeta>>;

    /// A fresh table basename.
    fn next_table_name(&self) -> String;

    /// Persists `manifest` and makes it the current version.
    fn install(&self, manifest: &Manifest) -> Result<()>;
}

/// Outcome of compacting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionResult {
    /// Level that was compacted.
    pub level: usize,
    /// Basenames of the merged files.
    pub inputs: Vec<String>,
    /// Basenames of the files written to `level + 1`.
    pub outputs: Vec<String>,
    /// Entries read from the inputs.
    pub entries_read: usize,
    /// Entries written to the outputs.
    pub entries_written: usize,
}

/// Compaction job that executes the compaction process
pub struct CompactionJob<'a, C: CompactionContext> {
    store: &'a TableStore,
    context: &'a C,
    options: &'a Options,
}

impl<'a, C: CompactionContext> CompactionJob<'a, C> {
    /// Create a new compaction job
    pub fn new(store: &'a TableStore, context: &'a C, options: &'a Options) -> Self {
        Self { store, context, options }
    }

    /// Compacts `manifest.level(level)[file_index]` into `level + 1` and
    /// installs the resulting manifest. On error the manifest is untouched;
    /// any tables already written become orphans removed at the next open.
    pub fn compact_sst(
        &self,
        manifest: &mut Manifest,
        level: usize,
        file_index: usize,
    ) -> Result<CompactionResult> {
        if level + 1 >= self.options.max_levels() {
            return Err(Error::bad_argument(format!("level {} has no level below it", level)));
        }

        let mut metas: Vec<Vec<Arc<TableMeta>>> = Vec::with_capacity(level + 2);
        for l in 0..=level + 1 {
            if l < level {
                metas.push(Vec::new());
                continue;
            }
            let level_metas =
                manifest.level(l).iter().map(|name| self.context.table(name)).collect::<Result<Vec<_>>>()?;
            metas.push(level_metas);
        }
        let views: Vec<Vec<&TableMeta>> =
            metas.iter().map(|tables| tables.iter().map(Arc::as_ref).collect()).collect();

        let inputs = pick_inputs(&views, level, file_index).ok_or_else(|| {
            Error::bad_argument(format!("level {} has no file {}", level, file_index))
        })?;
        let input_tables: Vec<&TableMeta> = inputs.files.iter().map(|&(l, i)| views[l][i]).collect();
        let input_names: Vec<String> = input_tables.iter().map(|t| t.name.clone()).collect();

        log::info!(
            "Compacting {} files of level {} and {} files of level {}",
            inputs.files.len() - inputs.num_next_level_files(),
            level,
            inputs.num_next_level_files(),
            level + 1
        );

        // Tombstones must survive while older versions may exist further down.
        let bottommost = manifest.deepest_populated_level().map_or(true, |deepest| deepest <= level + 1);
        let output = MultiwayMerge::new(self.store, &input_tables, self.options.sst_file_size)?
            .drop_tombstones(bottommost)
            .run(|| self.context.next_table_name())?;

        let outputs = output.file_names();
        let mut next = manifest.clone();
        next.apply_compaction(&inputs.files, outputs.clone(), level, inputs.insert_index)?;
        self.context.install(&next)?;
        *manifest = next;

        log::info!(
            "Compaction of level {} done: {} entries read, {} written to {} files",
            level,
            output.entries_read,
            output.entries_written,
            outputs.len()
        );
        Ok(CompactionResult {
            level,
            inputs: input_names,
            outputs,
            entries_read: output.entries_read,
            entries_written: output.entries_written,
        })
    }

    /// Compacts the oldest level-0 file, then every deeper level that has
    /// reached its threshold, top-down.
    pub fn background_compact(&self, manifest: &mut Manifest) -> Result<Vec<CompactionResult>> {
        let mut results = Vec::new();
        if manifest.level_len(0) > 0 {
            results.push(self.compact_sst(manifest, 0, 0)?);
        }
        for level in 1..self.options.max_levels().saturating_sub(1) {
            while manifest.level_len(level) as u64 >= self.options.level_threshold(level) {
                results.push(self.compact_sst(manifest, level, 0)?);
            }
        }
        Ok(results)
    }

    /// Whether `level` has reached its compaction threshold.
    pub fn needs_compaction(&self, manifest: &Manifest, level: usize) -> bool {
        level + 1 < self.options.max_levels()
            && manifest.level_len(level) as u64 >= self.options.level_threshold(level)
    }
}
