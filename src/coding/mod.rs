//! Binary encodings shared by the memtable, SST files and compaction.

pub mod comparator;
pub mod internal_entry;
pub mod varint;

pub use comparator::{EntryComparator, InternalEntryComparator, QueryComparator};
pub use internal_entry::{
    encode_internal, encode_to_vec, encoded_len, entry_id, entry_key, entry_len, entry_op_type,
    entry_value, query_entry, OpType, MAX_ENTRY_ID,
};
