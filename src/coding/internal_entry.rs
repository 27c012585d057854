//! Internal entry encoding.
//!
//! Every write becomes one self-describing record:
//!
//! ```text
//! varint(key_len) | key | id: u64 (LE) | op: u8 | [varint(value_len) | value]
//! ```
//!
//! The value part is present only for [`OpType::Insert`]. Entries are never
//! mutated once written; a newer version of a key is a new entry with a larger
//! id.
//!
//! The accessors ([`entry_key`], [`entry_id`], ...) assume a well-formed entry
//! and panic on malformed input. Data read from disk goes through
//! [`entry_len`] first, which validates the framing.

use crate::coding::varint::{decode_varint64, encode_varint64, varint_len};
use crate::error::{Error, Result};

/// Width of the id field.
pub const ID_SIZE: usize = 8;

/// Id used by lookup probes so they sort after every real version of a key.
pub const MAX_ENTRY_ID: u64 = u64::MAX;

/// Kind of write an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpType {
    /// Tombstone; carries no value.
    Delete = 0,
    /// Key/value write.
    Insert = 1,
}

impl OpType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OpType::Delete),
            1 => Some(OpType::Insert),
            _ => None,
        }
    }
}

/// Exact size of the encoded entry.
pub fn encoded_len(key: &[u8], value: &[u8], op: OpType) -> usize {
    let mut len = varint_len(key.len() as u64) + key.len() + ID_SIZE + 1;
    if op == OpType::Insert {
        len += varint_len(value.len() as u64) + value.len();
    }
    len
}

/// Encodes an entry into `dest`, which must hold at least [`encoded_len`]
/// bytes. Returns the number of bytes written. `value` is ignored for deletes.
pub fn encode_internal(
    key: &[u8],
    value: &[u8],
    id: u64,
    op: OpType,
    dest: &mut [u8],
) -> Result<usize> {
    let needed = encoded_len(key, value, op);
    if dest.len() < needed {
        return Err(Error::bad_argument(format!(
            "entry needs {} bytes, destination has {}",
            needed,
            dest.len()
        )));
    }
    Ok(write_entry(key, value, id, op, dest))
}

// `dest` must hold at least `encoded_len` bytes.
fn write_entry(key: &[u8], value: &[u8], id: u64, op: OpType, dest: &mut [u8]) -> usize {
    let mut pos = encode_varint64(key.len() as u64, dest);
    dest[pos..pos + key.len()].copy_from_slice(key);
    pos += key.len();
    dest[pos..pos + ID_SIZE].copy_from_slice(&id.to_le_bytes());
    pos += ID_SIZE;
    dest[pos] = op as u8;
    pos += 1;
    if op == OpType::Insert {
        pos += encode_varint64(value.len() as u64, &mut dest[pos..]);
        dest[pos..pos + value.len()].copy_from_slice(value);
        pos += value.len();
    }
    pos
}

/// Encodes an entry into a freshly allocated buffer.
pub fn encode_to_vec(key: &[u8], value: &[u8], id: u64, op: OpType) -> Vec<u8> {
    let mut buf = vec![0u8; encoded_len(key, value, op)];
    let written = write_entry(key, value, id, op, &mut buf);
    buf.truncate(written);
    buf
}

/// Lookup probe for `key`: maximal id, delete tag, no value.
pub fn query_entry(key: &[u8]) -> Vec<u8> {
    encode_to_vec(key, &[], MAX_ENTRY_ID, OpType::Delete)
}

fn key_bounds(entry: &[u8]) -> (usize, usize) {
    let (len, n) = decode_varint64(entry).unwrap_or((0, 0));
    (n, n + len as usize)
}

/// The user key.
pub fn entry_key(entry: &[u8]) -> &[u8] {
    let (start, end) = key_bounds(entry);
    &entry[start..end]
}

/// The write id.
pub fn entry_id(entry: &[u8]) -> u64 {
    let (_, end) = key_bounds(entry);
    let mut raw = [0u8; ID_SIZE];
    raw.copy_from_slice(&entry[end..end + ID_SIZE]);
    u64::from_le_bytes(raw)
}

/// The op tag. Unknown tags read as deletes.
pub fn entry_op_type(entry: &[u8]) -> OpType {
    let (_, end) = key_bounds(entry);
    OpType::from_u8(entry[end + ID_SIZE]).unwrap_or(OpType::Delete)
}

/// The value; empty for deletes.
pub fn entry_value(entry: &[u8]) -> &[u8] {
    let (_, end) = key_bounds(entry);
    let op_at = end + ID_SIZE;
    if entry[op_at] != OpType::Insert as u8 {
        return &[];
    }
    let (len, n) = decode_varint64(&entry[op_at + 1..]).unwrap_or((0, 0));
    let start = op_at + 1 + n;
    &entry[start..start + len as usize]
}

/// Length of the `varint | key | id` prefix, the part that decides ordering.
pub fn entry_head_len(entry: &[u8]) -> usize {
    let (_, end) = key_bounds(entry);
    end + ID_SIZE
}

/// Length of the entry at the head of `stream`, or `None` if the stream is
/// truncated or carries an unknown op tag.
pub fn entry_len(stream: &[u8]) -> Option<usize> {
    let (key_len, n) = decode_varint64(stream)?;
    let op_at = n.checked_add(usize::try_from(key_len).ok()?)?.checked_add(ID_SIZE)?;
    let op = OpType::from_u8(*stream.get(op_at)?)?;
    let mut end = op_at + 1;
    if op == OpType::Insert {
        let (value_len, m) = decode_varint64(stream.get(end..)?)?;
        end = end.checked_add(m)?.checked_add(usize::try_from(value_len).ok()?)?;
    }
    (end <= stream.len()).then_some(end)
}

/// Splits a data block into its entries.
pub fn split_entries(block: &[u8]) -> Result<Vec<&[u8]>> {
    let mut entries = Vec::new();
    let mut rest = block;
    while !rest.is_empty() {
        let len = entry_len(rest)
            .ok_or_else(|| Error::corruption("truncated entry in data block"))?;
        let (entry, tail) = rest.split_at(len);
        entries.push(entry);
        rest = tail;
    }
    Ok(entries)
}
