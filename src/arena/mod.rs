//! Block arena with per-block reference counts.
//!
//! Memory is handed out as [`Slot`]s: a block id plus a byte range inside the
//! block. Small requests are bump-allocated from the active block; requests
//! larger than a quarter of the block size get a block of their own. Every
//! block carries a reference count that starts at 1 and is bumped by each
//! further allocation carved from it. Blocks whose count reaches 0 stay alive
//! until [`Arena::release_idle_space`] frees them; slots pointing into a freed
//! block resolve to `None`.
//!
//! Ref counts are plain integers. An arena has a single owner: the memtable
//! arena is only touched under the memtable lock and a merge arena belongs to
//! one compaction.

use crate::error::{Error, Result};

/// Default size of an arena block.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Index of a block inside an arena.
pub type BlockId = usize;

/// Handle to bytes allocated from an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Owning block.
    pub block: BlockId,
    /// Start offset inside the block.
    pub offset: usize,
    /// Length in bytes.
    pub len: usize,
}

/// What an arena is used for. Decides block sizing and whether blocks can be
/// reallocated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaKind {
    /// Entries of a memtable; 4 KiB blocks.
    Memtable,
    /// Scratch space for a single point lookup.
    Query,
    /// Data blocks loaded by a compaction merge; every allocation is a block.
    Merge,
}

/// Block arena. See the module docs.
#[derive(Debug)]
pub struct Arena {
    kind: ArenaKind,
    block_size: usize,
    max_sector_size: usize,
    blocks: Vec<Option<Box<[u8]>>>,
    refs: Vec<u32>,
    active: Option<BlockId>,
    cursor: usize,
    remaining: usize,
    live_bytes: usize,
}

impl Arena {
    /// Creates an arena whose shared blocks are `block_size` bytes.
    pub fn new(kind: ArenaKind, block_size: usize) -> Self {
        Self {
            kind,
            block_size,
            max_sector_size: block_size / 4,
            blocks: Vec::new(),
            refs: Vec::new(),
            active: None,
            cursor: 0,
            remaining: 0,
            live_bytes: 0,
        }
    }

    /// Arena backing a memtable.
    pub fn for_memtable(block_size: usize) -> Self {
        Self::new(ArenaKind::Memtable, block_size)
    }

    /// Scratch arena for one lookup.
    pub fn for_query() -> Self {
        Self::new(ArenaKind::Query, DEFAULT_BLOCK_SIZE)
    }

    /// Arena for merge buffers: block size 0, so each allocation is a block.
    pub fn for_merge() -> Self {
        Self::new(ArenaKind::Merge, 0)
    }

    /// The arena's variant.
    pub fn kind(&self) -> ArenaKind {
        self.kind
    }

    /// Allocates `size` bytes. Returns `None` only if the system allocator
    /// cannot provide a new block.
    pub fn allocate(&mut self, size: usize) -> Option<Slot> {
        if size > self.max_sector_size {
            let block = self.push_block(size)?;
            return Some(Slot { block, offset: 0, len: size });
        }
        if size > self.remaining || self.active.is_none() {
            // Whatever is left in the old block is abandoned.
            let block = self.push_block(self.block_size)?;
            self.active = Some(block);
            self.cursor = size;
            self.remaining = self.block_size - size;
            return Some(Slot { block, offset: 0, len: size });
        }
        let block = self.active?;
        let slot = Slot { block, offset: self.cursor, len: size };
        self.cursor += size;
        self.remaining -= size;
        self.refs[block] += 1;
        Some(slot)
    }

    /// Allocates room for `data` and copies it in.
    pub fn allocate_copy(&mut self, data: &[u8]) -> Option<Slot> {
        let slot = self.allocate(data.len())?;
        self.slice_mut(slot)?.copy_from_slice(data);
        Some(slot)
    }

    fn push_block(&mut self, size: usize) -> Option<BlockId> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).ok()?;
        buf.resize(size, 0u8);
        self.blocks.push(Some(buf.into_boxed_slice()));
        self.refs.push(1);
        self.live_bytes += size;
        Some(self.blocks.len() - 1)
    }

    /// Replaces the contents of an idle block with a fresh `size`-byte buffer
    /// and takes one reference on it. Only merge arenas support this, and the
    /// block's count must be 0.
    pub fn reallocate(&mut self, size: usize, block: BlockId) -> Option<Slot> {
        if self.kind != ArenaKind::Merge || self.refs.get(block) != Some(&0) {
            return None;
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).ok()?;
        buf.resize(size, 0u8);
        let old = self.blocks[block].replace(buf.into_boxed_slice());
        self.live_bytes -= old.map_or(0, |b| b.len());
        self.live_bytes += size;
        self.refs[block] = 1;
        Some(Slot { block, offset: 0, len: size })
    }

    /// Bytes behind `slot`, or `None` if its block has been released.
    pub fn slice(&self, slot: Slot) -> Option<&[u8]> {
        let block = self.blocks.get(slot.block)?.as_ref()?;
        block.get(slot.offset..slot.offset.checked_add(slot.len)?)
    }

    /// Mutable bytes behind `slot`, or `None` if its block has been released.
    pub fn slice_mut(&mut self, slot: Slot) -> Option<&mut [u8]> {
        let block = self.blocks.get_mut(slot.block)?.as_mut()?;
        block.get_mut(slot.offset..slot.offset.checked_add(slot.len)?)
    }

    /// Takes one more reference on `block`.
    pub fn ref_block(&mut self, block: BlockId) {
        self.ref_block_by(block, 1);
    }

    /// Takes `times` more references on `block`.
    pub fn ref_block_by(&mut self, block: BlockId, times: u32) {
        if let Some(count) = self.refs.get_mut(block) {
            *count += times;
        }
    }

    /// Takes `times` more references on the most recently created block.
    pub fn ref_last(&mut self, times: u32) {
        if let Some(count) = self.refs.last_mut() {
            *count += times;
        }
    }

    /// Drops one reference and returns the remaining count, or `None` for an
    /// unknown block.
    pub fn unref(&mut self, block: BlockId) -> Option<u32> {
        let count = self.refs.get_mut(block)?;
        *count = count.saturating_sub(1);
        Some(*count)
    }

    /// Current reference count of `block`.
    pub fn ref_count(&self, block: BlockId) -> Option<u32> {
        self.refs.get(block).copied()
    }

    /// Frees every live block whose count is 0.
    pub fn release_idle_space(&mut self) {
        for block in 0..self.blocks.len() {
            if self.refs[block] == 0 && self.blocks[block].is_some() {
                self.free(block);
            }
        }
    }

    /// Frees a single block, which must have no references left.
    pub fn release_block(&mut self, block: BlockId) -> Result<()> {
        match self.refs.get(block) {
            None => Err(Error::bad_argument(format!("unknown arena block {}", block))),
            Some(0) => {
                self.free(block);
                Ok(())
            }
            Some(n) => Err(Error::undefined(format!(
                "arena block {} released with {} live references",
                block, n
            ))),
        }
    }

    fn free(&mut self, block: BlockId) {
        if let Some(buf) = self.blocks[block].take() {
            self.live_bytes -= buf.len();
        }
        if self.active == Some(block) {
            self.active = None;
            self.cursor = 0;
            self.remaining = 0;
        }
    }

    /// Bytes held by live blocks minus the unused tail of the active block.
    pub fn mem_usage(&self) -> usize {
        self.live_bytes - self.remaining
    }

    /// Number of block ids issued so far, released ones included.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of blocks still holding memory.
    pub fn live_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }
}
