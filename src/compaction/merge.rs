//! Multi-way merge of SST files for compaction.
//!
//! Every input contributes one data block at a time, loaded into a merge
//! arena. All entries of the loaded blocks sit in a min-heap in storage order;
//! each queued entry and each buffered output entry holds one reference on its
//! arena block. When the last queued entry of a source is popped, the next
//! block of that source is loaded, reusing the old block id if nothing refers
//! to it any more.
//!
//! Because storage order puts the newest version of a key last, a popped entry
//! with the same key as the last buffered one replaces it. Output files are cut
//! only when a new key arrives, so one key never spans two files.

use crate::arena::{Arena, BlockId, Slot};
use crate::coding::internal_entry::{entry_head_len, split_entries};
use crate::coding::{entry_key, entry_op_type, EntryComparator, InternalEntryComparator, OpType};
use crate::error::{Error, Result};
use crate::sstable::{TableMeta, TableSummary};
use crate::storage::TableStore;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap item: the ordering prefix of an entry plus where the entry lives.
struct MergeItem {
    head: Vec<u8>,
    slot: Slot,
    source: usize,
}

impl PartialEq for MergeItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeItem {}

impl PartialOrd for MergeItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the smallest entry first
        InternalEntryComparator
            .compare(&other.head, &self.head)
            .then_with(|| other.source.cmp(&self.source))
    }
}

struct Source<'a> {
    meta: &'a TableMeta,
    next_block: usize,
    queued: usize,
    current: Option<BlockId>,
}

/// Result of a merge.
#[derive(Debug, Default)]
pub struct MergeOutput {
    /// Tables written, in key order.
    pub tables: Vec<TableSummary>,
    /// Entries popped from the inputs.
    pub entries_read: usize,
    /// Entries written to the outputs.
    pub entries_written: usize,
}

impl MergeOutput {
    /// Basenames of the written tables, in key order.
    pub fn file_names(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter_map(|t| t.path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect()
    }
}

/// Merges a set of tables into new tables of about `target_size` bytes.
pub struct MultiwayMerge<'a> {
    store: &'a TableStore,
    sources: Vec<Source<'a>>,
    arena: Arena,
    heap: BinaryHeap<MergeItem>,
    target_size: usize,
    drop_tombstones: bool,
}

impl<'a> MultiwayMerge<'a> {
    /// Loads the first block of every input and queues its entries.
    pub fn new(store: &'a TableStore, inputs: &[&'a TableMeta], target_size: usize) -> Result<Self> {
        let mut merge = Self {
            store,
            sources: inputs
                .iter()
                .map(|meta| Source { meta, next_block: 0, queued: 0, current: None })
                .collect(),
            arena: Arena::for_merge(),
            heap: BinaryHeap::new(),
            target_size,
            drop_tombstones: false,
        };
        for source in 0..merge.sources.len() {
            merge.load_next_block(source)?;
        }
        Ok(merge)
    }

    /// Drops delete entries from the output. Only valid when no older data
    /// for these keys exists below the output level.
    pub fn drop_tombstones(mut self, value: bool) -> Self {
        self.drop_tombstones = value;
        self
    }

    /// Number of entries waiting in the heap.
    pub fn queued(&self) -> usize {
        self.heap.len()
    }

    fn load_next_block(&mut self, source: usize) -> Result<()> {
        let src = &mut self.sources[source];
        while src.queued == 0 && src.next_block < src.meta.num_blocks() {
            let reuse = src.current.filter(|&b| self.arena.ref_count(b) == Some(0));
            let slot = self.store.read_block_into(src.meta, src.next_block, &mut self.arena, reuse)?;
            src.next_block += 1;
            src.current = Some(slot.block);

            let block = self
                .arena
                .slice(slot)
                .ok_or_else(|| Error::undefined("merge block vanished after load"))?;
            let mut items = Vec::new();
            let mut offset = slot.offset;
            for entry in split_entries(block)? {
                items.push(MergeItem {
                    head: entry[..entry_head_len(entry)].to_vec(),
                    slot: Slot { block: slot.block, offset, len: entry.len() },
                    source,
                });
                offset += entry.len();
            }

            // The load reference becomes one reference per queued entry.
            src.queued = items.len();
            self.arena.ref_block_by(slot.block, items.len() as u32);
            self.arena.unref(slot.block);
            self.heap.extend(items);
        }
        Ok(())
    }

    /// Runs the merge to completion. `next_name` hands out the basename of
    /// each output table.
    pub fn run<F>(mut self, mut next_name: F) -> Result<MergeOutput>
    where
        F: FnMut() -> String,
    {
        let mut output = MergeOutput::default();
        let mut buffer: Vec<Slot> = Vec::new();
        let mut buffered_bytes = 0usize;
        let mut last_key: Vec<u8> = Vec::new();

        while let Some(item) = self.heap.pop() {
            output.entries_read += 1;
            let key = entry_key(&item.head);

            let superseded = match buffer.last_mut() {
                Some(last) if key == last_key.as_slice() => Some(std::mem::replace(last, item.slot)),
                _ => None,
            };
            if let Some(old) = superseded {
                // Newer version of the same key replaces the buffered one.
                self.arena.unref(old.block);
                buffered_bytes = buffered_bytes - old.len + item.slot.len;
            } else {
                if !buffer.is_empty() && buffered_bytes + item.slot.len > self.target_size {
                    self.flush(&mut buffer, &mut output, &mut next_name)?;
                    buffered_bytes = 0;
                }
                last_key.clear();
                last_key.extend_from_slice(key);
                buffered_bytes += item.slot.len;
                buffer.push(item.slot);
            }

            let src = &mut self.sources[item.source];
            src.queued -= 1;
            if src.queued == 0 {
                self.load_next_block(item.source)?;
            }
        }

        if !buffer.is_empty() {
            self.flush(&mut buffer, &mut output, &mut next_name)?;
        }
        Ok(output)
    }

    fn flush<F>(&mut self, buffer: &mut Vec<Slot>, output: &mut MergeOutput, next_name: &mut F) -> Result<()>
    where
        F: FnMut() -> String,
    {
        let mut entries = Vec::with_capacity(buffer.len());
        for slot in buffer.iter() {
            let entry = self
                .arena
                .slice(*slot)
                .ok_or_else(|| Error::undefined("buffered merge entry was released"))?;
            if self.drop_tombstones && entry_op_type(entry) == OpType::Delete {
                continue;
            }
            entries.push(entry);
        }

        if !entries.is_empty() {
            let name = next_name();
            let summary = self.store.write_table(&name, &entries)?;
            output.entries_written += summary.num_entries;
            output.tables.push(summary);
        }

        for slot in buffer.drain(..) {
            self.arena.unref(slot.block);
        }
        self.arena.release_idle_space();
        Ok(())
    }
}
