//! Variable-length integer encoding.
//!
//! Integers are stored as little-endian groups of 7 bits; every byte except the
//! last has its high bit (0x80) set. The format is wire-compatible with
//! Protocol Buffers varints.

use bytes::BufMut;

/// Longest encoding of a `u32`.
pub const MAX_VARINT32_LEN: usize = 5;

/// Longest encoding of a `u64`.
pub const MAX_VARINT64_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;

/// Writes `value` into `dst` and returns the number of bytes written.
///
/// # Panics
///
/// Panics if `dst` is shorter than [`varint_len`] of the value.
pub fn encode_varint32(value: u32, dst: &mut [u8]) -> usize {
    encode_varint64(u64::from(value), dst)
}

/// Writes `value` into `dst` and returns the number of bytes written.
///
/// # Panics
///
/// Panics if `dst` is shorter than [`varint_len`] of the value.
pub fn encode_varint64(mut value: u64, dst: &mut [u8]) -> usize {
    let mut i = 0;
    while value >= u64::from(CONTINUATION) {
        dst[i] = (value as u8) | CONTINUATION;
        value >>= 7;
        i += 1;
    }
    dst[i] = value as u8;
    i + 1
}

/// Appends the encoding of `value` to a buffer.
pub fn put_varint64<B: BufMut>(buf: &mut B, value: u64) {
    let mut scratch = [0u8; MAX_VARINT64_LEN];
    let n = encode_varint64(value, &mut scratch);
    buf.put_slice(&scratch[..n]);
}

/// Decodes a `u32` from the head of `src`, returning the value and the number
/// of bytes consumed. Returns `None` for truncated or overlong input.
pub fn decode_varint32(src: &[u8]) -> Option<(u32, usize)> {
    let (value, n) = decode_varint64(src)?;
    if n > MAX_VARINT32_LEN {
        return None;
    }
    u32::try_from(value).ok().map(|v| (v, n))
}

/// Decodes a `u64` from the head of `src`, returning the value and the number
/// of bytes consumed. Returns `None` for truncated or overlong input.
pub fn decode_varint64(src: &[u8]) -> Option<(u64, usize)> {
    let mut result = 0u64;
    for (i, &byte) in src.iter().take(MAX_VARINT64_LEN).enumerate() {
        result |= u64::from(byte & !CONTINUATION) << (7 * i);
        if byte & CONTINUATION == 0 {
            return Some((result, i + 1));
        }
    }
    None
}

/// Size of the varint at the head of `src`, found by scanning continuation
/// bits. Returns `None` if no terminating byte is found.
pub fn varint_len_in(src: &[u8]) -> Option<usize> {
    src.iter()
        .take(MAX_VARINT64_LEN)
        .position(|b| b & CONTINUATION == 0)
        .map(|p| p + 1)
}

/// Size of the encoding of `value`.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        put_varint64(&mut buf, value);
        buf
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xac, 0x02]);
        assert_eq!(encode(16383), vec![0xff, 0x7f]);
        assert_eq!(encode(16384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn test_boundaries() {
        let cases: [(u64, usize); 9] = [
            (0, 1),
            (127, 1),
            (128, 2),
            (16384, 3),
            (2_097_151, 3),
            (2_097_152, 4),
            (u64::from(u32::MAX), 5),
            (i64::MAX as u64, 9),
            (u64::MAX, 10),
        ];
        for (value, len) in cases {
            let buf = encode(value);
            assert_eq!(buf.len(), len, "length of {}", value);
            assert_eq!(varint_len(value), len);
            assert_eq!(varint_len_in(&buf), Some(len));
            assert_eq!(decode_varint64(&buf), Some((value, len)));
        }
    }

    #[test]
    fn test_varint32() {
        let mut buf = [0u8; MAX_VARINT32_LEN];
        let n = encode_varint32(u32::MAX, &mut buf);
        assert_eq!(n, 5);
        assert_eq!(decode_varint32(&buf[..n]), Some((u32::MAX, 5)));

        let too_big = encode(u64::from(u32::MAX) + 1);
        assert_eq!(decode_varint32(&too_big), None);
    }

    #[test]
    fn test_truncated_input() {
        assert_eq!(decode_varint64(&[]), None);
        assert_eq!(decode_varint64(&[0x80, 0x80]), None);
        assert_eq!(varint_len_in(&[0xff, 0xff]), None);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut buf = encode(300);
        buf.extend_from_slice(b"tail");
        assert_eq!(decode_varint64(&buf), Some((300, 2)));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(value in any::<u64>()) {
            let buf = encode(value);
            prop_assert_eq!(buf.len(), varint_len(value));
            prop_assert_eq!(decode_varint64(&buf), Some((value, buf.len())));
        }
    }
}
