//! Packed (variable length) unsigned longs
//!
//! Seven bits per byte, most significant group first. The final byte has its
//! high bit set, so the encoded length is recoverable from the bytes alone.

/// Longest encoding of a u64
pub const MAX_PACKED_LEN: usize = 10;

/// Number of bytes `value` occupies once packed
pub fn packed_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    ((bits + 6) / 7).max(1)
}

/// Pack `value`, returning the buffer and the number of bytes used
pub fn pack(value: u64) -> ([u8; MAX_PACKED_LEN], usize) {
    let len = packed_len(value);
    let mut out = [0u8; MAX_PACKED_LEN];
    for (i, byte) in out.iter_mut().take(len).enumerate() {
        let shift = 7 * (len - 1 - i);
        *byte = ((value >> shift) & 0x7F) as u8;
    }
    out[len - 1] |= 0x80;
    (out, len)
}

/// Decode a packed long from the start of `buf`.
///
/// Returns the value and its encoded length, or `None` if no terminating
/// byte appears within `MAX_PACKED_LEN` bytes.
pub fn unpack(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(MAX_PACKED_LEN).enumerate() {
        value = (value << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 != 0 {
            return Some((value, i + 1));
        }
    }
    None
}
