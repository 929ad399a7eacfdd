//! WAL append engine
//!
//! Reserves space in the current file with a compare-and-swap on the shared
//! cursor, then encodes the instruction into the reserved range. Appenders
//! running in parallel always receive disjoint ranges.
//!
//! A reservation that would cross a page boundary is moved to the start of
//! the next page within the same CAS. The abandoned tail of the page is then
//! filled with skip instructions so replay can walk past it.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::error::{Result, WalError};
use crate::volume::{Volume, SIX_LONG_MAX};

use super::files::WriteAheadLog;
use super::instruction::{self, BYTE_ARRAY_HEADER_SIZE, LONG_SIZE, MAX_BYTE_ARRAY_LEN, SKIP_MANY_SIZE};
use super::pointer::{WalPointer, POINTER_OFFSET_MAX};

/// A reserved range in the current file
struct Slot {
    volume: Arc<dyn Volume>,
    file_index: usize,
    offset: u64,
}

impl WriteAheadLog {
    /// Log an 8 byte write of `value` at `offset` in the main store
    pub fn append_long(&self, offset: u64, value: u64) -> Result<()> {
        WalError::check_range("target offset", offset, SIX_LONG_MAX)?;

        let mut buf = BytesMut::with_capacity(LONG_SIZE as usize);
        instruction::encode_long(&mut buf, offset, value);

        let slot = self.reserve(LONG_SIZE, false)?;
        slot.volume.put_data(slot.offset, &buf)
    }

    /// Log a write of `data` at `offset` in the main store.
    ///
    /// The returned pointer addresses the copy of `data` inside the log.
    pub fn append_byte_array(&self, offset: u64, data: &[u8]) -> Result<WalPointer> {
        WalError::check_range("target offset", offset, SIX_LONG_MAX)?;
        WalError::check_range("byte array length", data.len() as u64, MAX_BYTE_ARRAY_LEN)?;
        let size = BYTE_ARRAY_HEADER_SIZE + data.len() as u64;

        let mut buf = BytesMut::with_capacity(BYTE_ARRAY_HEADER_SIZE as usize);
        instruction::encode_byte_array_header(&mut buf, offset, data);

        let slot = self.reserve(size, true)?;
        let payload = slot.offset + BYTE_ARRAY_HEADER_SIZE;
        slot.volume.put_data(slot.offset, &buf)?;
        slot.volume.put_data(payload, data)?;

        WalPointer::byte_array(data.len(), slot.file_index, payload)
    }

    /// Log a whole record snapshot. `None` records a null value, which
    /// replays differently from an empty one.
    ///
    /// The returned pointer addresses the instruction itself.
    pub fn append_record(&self, record_id: u64, data: Option<&[u8]>) -> Result<WalPointer> {
        let size = instruction::record_size(record_id, data);

        let mut buf = BytesMut::with_capacity(size as usize - data.map_or(0, <[u8]>::len));
        instruction::encode_record_header(&mut buf, record_id, data);

        let slot = self.reserve(size, true)?;
        slot.volume.put_data(slot.offset, &buf)?;
        if let Some(data) = data {
            slot.volume.put_data(slot.offset + buf.len() as u64, data)?;
        }

        WalPointer::record(slot.file_index, slot.offset)
    }

    /// Log the deletion of a record
    pub fn append_tombstone(&self, record_id: u64) -> Result<()> {
        let size = instruction::tombstone_size(record_id);
        let mut buf = BytesMut::with_capacity(size as usize);
        instruction::encode_tombstone(&mut buf, record_id);

        let slot = self.reserve(size, false)?;
        slot.volume.put_data(slot.offset, &buf)
    }

    // =========================================================================
    // Reservation
    // =========================================================================

    /// Claim `size` contiguous bytes that do not cross a page boundary.
    ///
    /// With `addressable` set the range must also end within reach of a
    /// pointer offset; otherwise nothing is reserved.
    fn reserve(&self, size: u64, addressable: bool) -> Result<Slot> {
        let volume = self.current.as_ref().ok_or(WalError::NoActiveFile)?;
        let file_index = self.file_num.ok_or(WalError::NoActiveFile)?;
        let page_size = self.config.page_size();
        if size > page_size {
            return Err(WalError::InstructionTooLarge { size, page_size });
        }

        let mut current = self.cursor.load(Ordering::Acquire);
        loop {
            let start = if crosses_page(current, size, self.config.page_shift) {
                next_page(current, self.config.page_shift)
            } else {
                current
            };
            if addressable {
                WalError::check_range("pointer offset", start + size, POINTER_OFFSET_MAX)?;
            }

            match self.cursor.compare_exchange_weak(
                current,
                start + size,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    volume.ensure_available(start + size)?;
                    if start != current {
                        pad(volume.as_ref(), current, start)?;
                    }
                    trace!(file = file_index, offset = start, size, "Reserved WAL range");
                    return Ok(Slot {
                        volume: Arc::clone(volume),
                        file_index,
                        offset: start,
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// True when `[start, start + size)` spans two pages
pub(crate) fn crosses_page(start: u64, size: u64, page_shift: u32) -> bool {
    size > 0 && (start >> page_shift) != ((start + size - 1) >> page_shift)
}

fn next_page(offset: u64, page_shift: u32) -> u64 {
    ((offset >> page_shift) + 1) << page_shift
}

/// Fill `[from, to)`, which ends at a page boundary, with skip instructions.
///
/// Up to four bytes are padded with SKIP_SINGLE, anything longer with one
/// SKIP_MANY word followed by the skipped bytes.
fn pad(volume: &dyn Volume, from: u64, to: u64) -> Result<()> {
    let len = to - from;
    if len <= SKIP_MANY_SIZE {
        for offset in from..to {
            volume.put_u8(offset, instruction::encode_skip_single(offset))?;
        }
    } else {
        volume.put_data(from, &instruction::encode_skip_many(len - SKIP_MANY_SIZE))?;
    }
    debug!(from, to, "Padded WAL page tail");
    Ok(())
}
