//! WAL instruction definitions
//!
//! Instruction kinds, their encoded sizes and 4-bit checksums. Each
//! instruction starts with one header byte: `(kind << 4) | checksum`.
//!
//! Checksums count set bits. Numeric fields contribute their popcount and
//! payload bytes contribute the popcount of every byte, so flipping any
//! single bit of a field or payload changes the checksum.

use bytes::{BufMut, BytesMut};

use crate::volume::packed;

/// Encoded size of a LONG instruction
pub const LONG_SIZE: u64 = 1 + 8 + 6;

/// Encoded size of a BYTE_ARRAY instruction before its payload
pub const BYTE_ARRAY_HEADER_SIZE: u64 = 1 + 2 + 6;

/// Size of the SKIP_MANY word; the skipped bytes follow it
pub const SKIP_MANY_SIZE: u64 = 4;

/// Largest payload a BYTE_ARRAY instruction can carry
pub const MAX_BYTE_ARRAY_LEN: u64 = 0xFFFF;

/// Largest number of bytes a SKIP_MANY instruction can skip
pub const MAX_SKIP_LEN: u64 = 0x00FF_FFFF;

/// Instruction tag stored in the high nibble of the header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstructionKind {
    Eof = 0,
    Long = 1,
    ByteArray = 2,
    SkipMany = 3,
    SkipSingle = 4,
    Record = 5,
    Tombstone = 6,
}

impl TryFrom<u8> for InstructionKind {
    type Error = u8;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match tag {
            0 => InstructionKind::Eof,
            1 => InstructionKind::Long,
            2 => InstructionKind::ByteArray,
            3 => InstructionKind::SkipMany,
            4 => InstructionKind::SkipSingle,
            5 => InstructionKind::Record,
            6 => InstructionKind::Tombstone,
            other => return Err(other),
        })
    }
}

/// A decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// End of written data in this file
    Eof,

    /// Overwrite 8 bytes at `offset`
    Long { offset: u64, value: u64 },

    /// Overwrite `data.len()` bytes at `offset`
    ByteArray { offset: u64, data: Vec<u8> },

    /// Padding: `len` bytes follow the 4 byte instruction word
    SkipMany { len: u64 },

    /// One byte of padding
    SkipSingle,

    /// Whole record snapshot; `None` is a null record
    Record { record_id: u64, data: Option<Vec<u8>> },

    /// Record deletion
    Tombstone { record_id: u64 },
}

impl Instruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Eof => InstructionKind::Eof,
            Instruction::Long { .. } => InstructionKind::Long,
            Instruction::ByteArray { .. } => InstructionKind::ByteArray,
            Instruction::SkipMany { .. } => InstructionKind::SkipMany,
            Instruction::SkipSingle => InstructionKind::SkipSingle,
            Instruction::Record { .. } => InstructionKind::Record,
            Instruction::Tombstone { .. } => InstructionKind::Tombstone,
        }
    }
}

// =============================================================================
// Header byte
// =============================================================================

/// Build a header byte from a kind and checksum
pub fn header_byte(kind: InstructionKind, checksum: u8) -> u8 {
    ((kind as u8) << 4) | (checksum & 0xF)
}

/// Split a header byte into (tag, checksum)
pub fn split_header(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0xF)
}

// =============================================================================
// Checksums
// =============================================================================

fn nibble(sum: u32) -> u8 {
    (sum & 0xF) as u8
}

fn bit_sum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, b| acc.wrapping_add(b.count_ones()))
}

/// EOF and SKIP_SINGLE are checksummed by their own position
pub fn position_checksum(offset: u64) -> u8 {
    nibble(offset.count_ones())
}

pub fn skip_many_checksum(len: u64) -> u8 {
    nibble(len.count_ones())
}

pub fn long_checksum(offset: u64, value: u64) -> u8 {
    nibble(1 + value.count_ones() + offset.count_ones())
}

pub fn byte_array_checksum(offset: u64, data: &[u8]) -> u8 {
    let len = data.len() as u64;
    nibble(
        (1 + len.count_ones() + offset.count_ones()).wrapping_add(bit_sum(data)),
    )
}

/// `size_field` is the stored size: 0 for null, otherwise length + 1
pub fn record_checksum(record_id: u64, size_field: u64, data: &[u8]) -> u8 {
    nibble(
        (1 + record_id.count_ones() + size_field.count_ones()).wrapping_add(bit_sum(data)),
    )
}

pub fn tombstone_checksum(record_id: u64) -> u8 {
    nibble(1 + record_id.count_ones())
}

// =============================================================================
// Sizes
// =============================================================================

/// Stored size field of a record: 0 for null, otherwise length + 1
pub fn record_size_field(data: Option<&[u8]>) -> u64 {
    data.map_or(0, |d| d.len() as u64 + 1)
}

pub fn record_size(record_id: u64, data: Option<&[u8]>) -> u64 {
    let payload = data.map_or(0, |d| d.len() as u64);
    1 + packed::packed_len(record_id) as u64
        + packed::packed_len(record_size_field(data)) as u64
        + payload
}

pub fn tombstone_size(record_id: u64) -> u64 {
    1 + packed::packed_len(record_id) as u64
}

// =============================================================================
// Encoding
// =============================================================================

fn put_packed(buf: &mut BytesMut, value: u64) {
    let (bytes, len) = packed::pack(value);
    buf.put_slice(&bytes[..len]);
}

fn put_six(buf: &mut BytesMut, value: u64) {
    buf.put_slice(&value.to_be_bytes()[2..]);
}

pub(crate) fn encode_long(buf: &mut BytesMut, offset: u64, value: u64) {
    buf.put_u8(header_byte(InstructionKind::Long, long_checksum(offset, value)));
    buf.put_u64(value);
    put_six(buf, offset);
}

/// Everything but the payload, which is written separately
pub(crate) fn encode_byte_array_header(buf: &mut BytesMut, offset: u64, data: &[u8]) {
    buf.put_u8(header_byte(
        InstructionKind::ByteArray,
        byte_array_checksum(offset, data),
    ));
    buf.put_u16(data.len() as u16);
    put_six(buf, offset);
}

/// Everything but the payload, which is written separately
pub(crate) fn encode_record_header(buf: &mut BytesMut, record_id: u64, data: Option<&[u8]>) {
    let size_field = record_size_field(data);
    let checksum = record_checksum(record_id, size_field, data.unwrap_or(&[]));
    buf.put_u8(header_byte(InstructionKind::Record, checksum));
    put_packed(buf, record_id);
    put_packed(buf, size_field);
}

pub(crate) fn encode_tombstone(buf: &mut BytesMut, record_id: u64) {
    buf.put_u8(header_byte(
        InstructionKind::Tombstone,
        tombstone_checksum(record_id),
    ));
    put_packed(buf, record_id);
}

/// The 4 byte SKIP_MANY word: header byte followed by a 3 byte length
pub(crate) fn encode_skip_many(len: u64) -> [u8; 4] {
    debug_assert!(len <= MAX_SKIP_LEN);
    let word = (u32::from(header_byte(InstructionKind::SkipMany, skip_many_checksum(len))) << 24)
        | (len as u32 & 0x00FF_FFFF);
    word.to_be_bytes()
}

pub(crate) fn encode_skip_single(offset: u64) -> u8 {
    header_byte(InstructionKind::SkipSingle, position_checksum(offset))
}
