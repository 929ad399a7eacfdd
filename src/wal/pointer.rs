//! WAL pointers
//!
//! Compact 64-bit handles to data that lives in a log file.
//!
//! ```text
//! byte array: [size:16][file:16][offset:32]   offset of the payload
//! record:     [  0:16 ][file:16][offset:32]   offset of the instruction
//! ```

use std::fmt;

use crate::error::{Result, WalError};

pub const POINTER_OFFSET_BITS: u32 = 32;
pub const POINTER_FILE_BITS: u32 = 16;
pub const POINTER_SIZE_BITS: u32 = 16;

pub const POINTER_OFFSET_MAX: u64 = (1 << POINTER_OFFSET_BITS) - 1;
pub const POINTER_FILE_MAX: u64 = (1 << POINTER_FILE_BITS) - 1;
pub const POINTER_SIZE_MAX: u64 = (1 << POINTER_SIZE_BITS) - 1;

/// Opaque handle to WAL-resident data
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalPointer(u64);

impl WalPointer {
    /// Pointer to `size` payload bytes at `offset` in file `file_index`
    pub fn byte_array(size: usize, file_index: usize, offset: u64) -> Result<Self> {
        WalError::check_range("pointer size", size as u64, POINTER_SIZE_MAX)?;
        WalError::check_range("pointer file index", file_index as u64, POINTER_FILE_MAX)?;
        WalError::check_range("pointer offset", offset, POINTER_OFFSET_MAX)?;

        Ok(Self(
            (size as u64) << (POINTER_OFFSET_BITS + POINTER_FILE_BITS)
                | (file_index as u64) << POINTER_OFFSET_BITS
                | offset,
        ))
    }

    /// Pointer to the RECORD instruction starting at `offset`
    pub fn record(file_index: usize, offset: u64) -> Result<Self> {
        Self::byte_array(0, file_index, offset)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Payload size; always 0 for record pointers
    pub fn size(self) -> usize {
        ((self.0 >> (POINTER_OFFSET_BITS + POINTER_FILE_BITS)) & POINTER_SIZE_MAX) as usize
    }

    pub fn file_index(self) -> usize {
        ((self.0 >> POINTER_OFFSET_BITS) & POINTER_FILE_MAX) as usize
    }

    pub fn offset(self) -> u64 {
        self.0 & POINTER_OFFSET_MAX
    }
}

impl From<WalPointer> for u64 {
    fn from(pointer: WalPointer) -> Self {
        pointer.0
    }
}

impl fmt::Debug for WalPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalPointer")
            .field("size", &self.size())
            .field("file", &self.file_index())
            .field("offset", &self.offset())
            .finish()
    }
}
