//! WAL Reader
//!
//! Decodes and validates instructions from a single log file, and resolves
//! WAL pointers back to the data they address.

use std::io;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Result, WalError};
use crate::volume::{Volume, VolumeReader};

use super::files::WriteAheadLog;
use super::instruction::{
    self, Instruction, InstructionKind, BYTE_ARRAY_HEADER_SIZE, LONG_SIZE, SKIP_MANY_SIZE,
};
use super::pointer::WalPointer;
use super::{FILE_HEADER_SIZE, SEAL_OFFSET, WAL_HEADER, WAL_SEAL, WAL_STORE_VERSION};

/// The 16 byte header at the start of every log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub header: u32,
    /// Feature bitmap while the file is open, `WAL_SEAL` once sealed
    pub slot: u64,
}

impl FileHeader {
    /// Read the header, or `None` if the volume is too short to hold one
    pub fn read(volume: &dyn Volume) -> Result<Option<Self>> {
        if volume.length() < FILE_HEADER_SIZE {
            return Ok(None);
        }
        Ok(Some(Self {
            header: volume.get_u32(0)?,
            slot: volume.get_u64(SEAL_OFFSET)?,
        }))
    }

    pub fn is_sealed(&self) -> bool {
        self.slot == WAL_SEAL
    }

    pub fn has_valid_magic(&self) -> bool {
        self.header >> 16 == WAL_HEADER >> 16
    }

    pub fn version(&self) -> u32 {
        self.header & 0xFFFF
    }

    pub fn is_current_version(&self) -> bool {
        self.version() == WAL_STORE_VERSION
    }
}

/// One decoded instruction and where it sits in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadInstruction {
    pub offset: u64,
    /// Encoded length, including any bytes a SKIP_MANY jumps over
    pub len: u64,
    pub instruction: Instruction,
}

/// Reads instructions sequentially, validating each checksum
pub struct WalReader<'a> {
    volume: &'a dyn Volume,
    file_index: usize,
    pos: u64,
    len: u64,
    done: bool,
}

impl<'a> WalReader<'a> {
    /// Reader positioned at the first instruction of the file
    pub fn new(volume: &'a dyn Volume, file_index: usize) -> Self {
        Self::at(volume, file_index, FILE_HEADER_SIZE)
    }

    /// Reader positioned at an arbitrary instruction start
    pub fn at(volume: &'a dyn Volume, file_index: usize, offset: u64) -> Self {
        Self {
            volume,
            file_index,
            pos: offset,
            len: volume.length(),
            done: false,
        }
    }

    /// A file is replayable only once it holds a full header and the seal
    pub fn is_sealed(volume: &dyn Volume) -> Result<bool> {
        Ok(FileHeader::read(volume)?.is_some_and(|h| h.is_sealed()))
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Decode the next instruction. Returns `None` once EOF has been read.
    pub fn next_instruction(&mut self) -> Result<Option<ReadInstruction>> {
        if self.done {
            return Ok(None);
        }
        let start = self.pos;
        self.require(start, 1)?;
        let (tag, stored) = instruction::split_header(self.volume.get_u8(start)?);
        let kind = InstructionKind::try_from(tag)
            .map_err(|tag| self.corrupt(start, format!("unknown instruction tag {}", tag)))?;

        let (instruction, len, computed) = match kind {
            InstructionKind::Eof => (Instruction::Eof, 1, instruction::position_checksum(start)),

            InstructionKind::Long => {
                self.require(start, LONG_SIZE)?;
                let value = self.volume.get_u64(start + 1)?;
                let offset = self.volume.get_six_long(start + 9)?;
                (
                    Instruction::Long { offset, value },
                    LONG_SIZE,
                    instruction::long_checksum(offset, value),
                )
            }

            InstructionKind::ByteArray => {
                self.require(start, BYTE_ARRAY_HEADER_SIZE)?;
                let size = u64::from(self.volume.get_u16(start + 1)?);
                let offset = self.volume.get_six_long(start + 3)?;
                self.require(start, BYTE_ARRAY_HEADER_SIZE + size)?;
                let mut data = vec![0u8; size as usize];
                self.volume.get_data(start + BYTE_ARRAY_HEADER_SIZE, &mut data)?;
                let checksum = instruction::byte_array_checksum(offset, &data);
                (
                    Instruction::ByteArray { offset, data },
                    BYTE_ARRAY_HEADER_SIZE + size,
                    checksum,
                )
            }

            InstructionKind::SkipMany => {
                self.require(start, SKIP_MANY_SIZE)?;
                let skip = u64::from(self.volume.get_u32(start)? & 0x00FF_FFFF);
                self.require(start, SKIP_MANY_SIZE + skip)?;
                (
                    Instruction::SkipMany { len: skip },
                    SKIP_MANY_SIZE + skip,
                    instruction::skip_many_checksum(skip),
                )
            }

            InstructionKind::SkipSingle => (
                Instruction::SkipSingle,
                1,
                instruction::position_checksum(start),
            ),

            InstructionKind::Record => {
                let (record_id, id_len) = self.packed(start, 1)?;
                let (size_field, size_len) = self.packed(start, 1 + id_len)?;
                let header = 1 + id_len + size_len;
                let payload = size_field.saturating_sub(1);
                self.require(start, header.saturating_add(payload))?;

                let data = if size_field == 0 {
                    None
                } else {
                    let mut data = vec![0u8; payload as usize];
                    self.volume.get_data(start + header, &mut data)?;
                    Some(data)
                };
                let checksum = instruction::record_checksum(
                    record_id,
                    size_field,
                    data.as_deref().unwrap_or(&[]),
                );
                (
                    Instruction::Record { record_id, data },
                    header + payload,
                    checksum,
                )
            }

            InstructionKind::Tombstone => {
                let (record_id, id_len) = self.packed(start, 1)?;
                (
                    Instruction::Tombstone { record_id },
                    1 + id_len,
                    instruction::tombstone_checksum(record_id),
                )
            }
        };

        if computed != stored {
            return Err(self.corrupt(
                start,
                format!(
                    "{:?} checksum mismatch: stored {}, computed {}",
                    kind, stored, computed
                ),
            ));
        }

        self.pos = start + len;
        self.done = kind == InstructionKind::Eof;
        Ok(Some(ReadInstruction {
            offset: start,
            len,
            instruction,
        }))
    }

    /// Check that `len` bytes from the instruction at `start` lie inside the file
    fn require(&self, start: u64, len: u64) -> Result<()> {
        match start.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(self.corrupt(start, "instruction runs past end of file")),
        }
    }

    /// Read the packed field `field` bytes into the instruction at `start`
    fn packed(&self, start: u64, field: u64) -> Result<(u64, u64)> {
        self.require(start, field + 1)?;
        match self.volume.get_packed_long(start + field) {
            Ok((value, len)) => Ok((value, len as u64)),
            Err(WalError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Err(self.corrupt(start, "unterminated packed long"))
            }
            Err(e) => Err(e),
        }
    }

    fn corrupt(&self, offset: u64, reason: impl Into<String>) -> WalError {
        WalError::corruption(self.file_index, offset, reason)
    }
}

impl Iterator for WalReader<'_> {
    type Item = Result<ReadInstruction>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_instruction() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// =============================================================================
// Pointer resolution
// =============================================================================

impl WriteAheadLog {
    fn volume_for(&self, pointer: WalPointer) -> Result<&Arc<dyn Volume>> {
        let index = pointer.file_index();
        self.volumes.get(index).ok_or(WalError::UnknownFile(index))
    }

    /// Stream the bytes written by `append_byte_array`
    pub fn wal_get_byte_array(&self, pointer: WalPointer) -> Result<VolumeReader> {
        let volume = self.volume_for(pointer)?;
        Ok(VolumeReader::new(
            Arc::clone(volume),
            pointer.offset(),
            pointer.size() as u64,
        ))
    }

    /// Copy of the bytes written by `append_byte_array`
    pub fn wal_get_byte_array_copy(&self, pointer: WalPointer) -> Result<Bytes> {
        let volume = self.volume_for(pointer)?;
        let mut data = vec![0u8; pointer.size()];
        volume.get_data(pointer.offset(), &mut data)?;
        Ok(Bytes::from(data))
    }

    /// The record written by `append_record`; `None` for a null record.
    ///
    /// The addressed instruction is decoded in full, so a pointer that does
    /// not land on an intact RECORD instruction is reported as corruption.
    pub fn wal_get_record(&self, pointer: WalPointer) -> Result<Option<Bytes>> {
        let volume = self.volume_for(pointer)?;
        let mut reader = WalReader::at(volume.as_ref(), pointer.file_index(), pointer.offset());
        match reader.next_instruction()? {
            Some(ReadInstruction {
                instruction: Instruction::Record { data, .. },
                ..
            }) => Ok(data.map(Bytes::from)),
            other => Err(WalError::corruption(
                pointer.file_index(),
                pointer.offset(),
                format!(
                    "pointer does not address a record: {:?}",
                    other.map(|entry| entry.instruction.kind())
                ),
            )),
        }
    }
}
