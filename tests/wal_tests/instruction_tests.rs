//! Tests for WAL instruction encoding
//!
//! These tests verify:
//! - Header byte layout (kind in the high nibble, checksum in the low)
//! - Checksum rules for every instruction kind
//! - Encoded sizes, including packed record fields

use mapwal::wal::instruction::{
    byte_array_checksum, header_byte, long_checksum, position_checksum, record_checksum,
    record_size, record_size_field, skip_many_checksum, split_header, tombstone_checksum,
    tombstone_size, BYTE_ARRAY_HEADER_SIZE, LONG_SIZE,
};
use mapwal::wal::{Instruction, InstructionKind};

// =============================================================================
// Header Byte
// =============================================================================

#[test]
fn test_header_byte_layout() {
    let byte = header_byte(InstructionKind::Record, 0xB);
    assert_eq!(byte, 0x5B);
    assert_eq!(split_header(byte), (5, 0xB));
}

#[test]
fn test_header_byte_masks_checksum() {
    assert_eq!(header_byte(InstructionKind::Long, 0x1F), 0x1F);
    assert_eq!(header_byte(InstructionKind::Eof, 0xFF), 0x0F);
}

#[test]
fn test_instruction_kind_matches_variant() {
    assert_eq!(Instruction::Eof.kind(), InstructionKind::Eof);
    assert_eq!(Instruction::SkipSingle.kind(), InstructionKind::SkipSingle);
    assert_eq!(Instruction::SkipMany { len: 3 }.kind(), InstructionKind::SkipMany);
    assert_eq!(
        Instruction::Record { record_id: 1, data: None }.kind(),
        InstructionKind::Record
    );
    assert_eq!(
        Instruction::Tombstone { record_id: 1 }.kind(),
        InstructionKind::Tombstone
    );
}

// =============================================================================
// Checksums
// =============================================================================

#[test]
fn test_position_checksum() {
    assert_eq!(position_checksum(16), 1);
    assert_eq!(position_checksum(31), 5);
    assert_eq!(position_checksum(u64::MAX), 0); // 64 & 15
}

#[test]
fn test_long_checksum() {
    // 1 + popcount(42) + popcount(1000) = 1 + 3 + 6
    assert_eq!(long_checksum(1000, 42), 10);
    assert_eq!(long_checksum(0, 0), 1);
    // 1 + 64 + 0 wraps to 1
    assert_eq!(long_checksum(0, u64::MAX), 1);
}

#[test]
fn test_byte_array_checksum_counts_length_and_payload_bits() {
    // 1 + popcount(len 2) + popcount(offset 3) + bits(0x03, 0x80)
    assert_eq!(byte_array_checksum(3, &[0x03, 0x80]), (1 + 1 + 2 + 3) & 0xF);
    assert_eq!(byte_array_checksum(0, &[]), 1);
}

#[test]
fn test_skip_many_checksum_has_no_bias() {
    assert_eq!(skip_many_checksum(0), 0);
    assert_eq!(skip_many_checksum(0xFF), 8);
}

#[test]
fn test_record_checksum_covers_every_field() {
    let base = record_checksum(7, 4, &[1, 2, 3]);
    assert_ne!(record_checksum(6, 4, &[1, 2, 3]), base);
    assert_ne!(record_checksum(7, 5, &[1, 2, 3]), base);
    assert_ne!(record_checksum(7, 4, &[1, 2, 2]), base);
    assert_eq!(tombstone_checksum(7), (1 + 3) as u8);
}

// =============================================================================
// Sizes
// =============================================================================

#[test]
fn test_fixed_sizes() {
    assert_eq!(LONG_SIZE, 15);
    assert_eq!(BYTE_ARRAY_HEADER_SIZE, 9);
}

#[test]
fn test_record_size_field_distinguishes_null() {
    assert_eq!(record_size_field(None), 0);
    assert_eq!(record_size_field(Some(&[])), 1);
    assert_eq!(record_size_field(Some(&[9; 10])), 11);
}

#[test]
fn test_record_and_tombstone_sizes() {
    assert_eq!(record_size(5, None), 3);
    assert_eq!(record_size(5, Some(&[])), 3);
    assert_eq!(record_size(5, Some(&[1, 2, 3])), 6);
    // id 200 packs into two bytes, size field 201 into two bytes
    assert_eq!(record_size(200, Some(&[0; 200])), 1 + 2 + 2 + 200);
    assert_eq!(tombstone_size(127), 2);
    assert_eq!(tombstone_size(128), 3);
    assert_eq!(tombstone_size(u64::MAX), 11);
}
