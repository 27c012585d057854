//! SSTable (Sorted String Table) implementation.
//!
//! An SSTable is an immutable file of internal entries in ascending storage
//! order.
//!
//! ## File Format
//!
//! ```text
//! [Data Block 1]
//! [Data Block 2]
//! ...
//! [Data Block N]
//! [Index Block]     // u32 count + u32 start offset per data block
//! [Flexible Block]  // crc32 of data region, max entry id, bloom filter
//! [Footer: 24B]     // min/max entry location and block sizes
//! ```
//!
//! Data blocks are plain concatenations of encoded entries. A block is closed
//! by the first entry that carries it past the target size, so entries are
//! never split across blocks. All integers are little-endian.
//!
//! Files are named `{id:016X}.tdb`.

pub mod builder;
pub mod flexible;
pub mod footer;
pub mod index;
pub mod reader;

pub use builder::{write_table, SstBuilder, TableSummary};
pub use flexible::FlexibleBlock;
pub use footer::Footer;
pub use index::IndexBlock;
pub use reader::TableMeta;

/// Default block size (4KB)
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Footer size in bytes (fixed)
pub const FOOTER_SIZE: usize = 24;

/// Extension of table files.
pub const TABLE_EXTENSION: &str = "tdb";

/// Basename of the table with file id `id`.
pub fn table_name(id: u64) -> String {
    format!("{:016X}", id)
}

/// File id encoded in a table basename, if it is one.
pub fn parse_table_name(name: &str) -> Option<u64> {
    if name.len() != 16 {
        return None;
    }
    u64::from_str_radix(name, 16).ok()
}
