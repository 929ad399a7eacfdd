//! Volume Module
//!
//! Growable, randomly addressable byte storage the log is written through.
//!
//! ## Responsibilities
//! - Absolute-offset reads and writes (big-endian typed accessors)
//! - Explicit growth via `ensure_available`
//! - Durable flush, truncation, close and delete
//!
//! All methods take `&self`: concurrent appenders write disjoint ranges of
//! the same volume, so implementations carry their own locking.

mod file;
mod memory;
pub mod packed;

use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, WalError};

pub use file::{FileVolume, FileVolumeFactory};
pub use memory::{MemoryVolume, MemoryVolumeFactory};

/// Random-access byte storage backing one log file
pub trait Volume: Send + Sync {
    /// Grow the volume so that at least `min_size` bytes are addressable
    fn ensure_available(&self, min_size: u64) -> Result<()>;

    /// Write `data` at `offset`; the range must already be available
    fn put_data(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Fill `buf` from `offset`
    fn get_data(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Current size in bytes
    fn length(&self) -> u64;

    /// Force written data to durable storage
    fn sync(&self) -> Result<()>;

    fn truncate(&self, size: u64) -> Result<()>;

    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;

    /// Remove the backing file, if there is one
    fn delete_file(&self) -> Result<()>;

    // -------------------------------------------------------------------------
    // Typed accessors (big-endian)
    // -------------------------------------------------------------------------

    fn put_u8(&self, offset: u64, value: u8) -> Result<()> {
        self.put_data(offset, &[value])
    }

    fn get_u8(&self, offset: u64) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.get_data(offset, &mut buf)?;
        Ok(buf[0])
    }

    fn get_u16(&self, offset: u64) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.get_data(offset, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn put_u32(&self, offset: u64, value: u32) -> Result<()> {
        self.put_data(offset, &value.to_be_bytes())
    }

    fn get_u32(&self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.get_data(offset, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn put_u64(&self, offset: u64, value: u64) -> Result<()> {
        self.put_data(offset, &value.to_be_bytes())
    }

    fn get_u64(&self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.get_data(offset, &mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Write the low 48 bits of `value` as six bytes
    fn put_six_long(&self, offset: u64, value: u64) -> Result<()> {
        WalError::check_range("six byte value", value, SIX_LONG_MAX)?;
        self.put_data(offset, &value.to_be_bytes()[2..])
    }

    fn get_six_long(&self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.get_data(offset, &mut buf[2..])?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Write `value` in packed form, returning the number of bytes used
    fn put_packed_long(&self, offset: u64, value: u64) -> Result<usize> {
        let (buf, len) = packed::pack(value);
        self.put_data(offset, &buf[..len])?;
        Ok(len)
    }

    /// Read a packed long, returning the value and its encoded length.
    ///
    /// Fails with `InvalidData` if no terminating byte is found before the
    /// end of the volume or within `MAX_PACKED_LEN` bytes.
    fn get_packed_long(&self, offset: u64) -> Result<(u64, usize)> {
        let available = self.length().saturating_sub(offset).min(packed::MAX_PACKED_LEN as u64);
        if available == 0 {
            return Err(out_of_bounds(offset, 1, self.length()));
        }
        let mut buf = [0u8; packed::MAX_PACKED_LEN];
        self.get_data(offset, &mut buf[..available as usize])?;
        packed::unpack(&buf[..available as usize]).ok_or_else(|| {
            WalError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unterminated packed long at {}", offset),
            ))
        })
    }
}

/// Largest value a six byte field holds
pub const SIX_LONG_MAX: u64 = (1 << 48) - 1;

/// Creates the volume backing each log file
pub trait VolumeFactory: Send + Sync {
    /// Open (or create) the volume for `path`; `None` asks for an anonymous volume
    fn make_volume(&self, path: Option<&Path>) -> Result<Arc<dyn Volume>>;
}

/// Streaming reader over a bounded range of a volume
pub struct VolumeReader {
    volume: Arc<dyn Volume>,
    pos: u64,
    end: u64,
}

impl VolumeReader {
    pub fn new(volume: Arc<dyn Volume>, offset: u64, len: u64) -> Self {
        Self {
            volume,
            pos: offset,
            end: offset + len,
        }
    }

    /// Bytes left to read
    pub fn remaining(&self) -> u64 {
        self.end - self.pos
    }
}

impl Read for VolumeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = (buf.len() as u64).min(self.remaining()) as usize;
        if n == 0 {
            return Ok(0);
        }
        self.volume
            .get_data(self.pos, &mut buf[..n])
            .map_err(|e| match e {
                WalError::Io(io) => io,
                other => io::Error::new(io::ErrorKind::Other, other.to_string()),
            })?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Error for an access outside the addressable range of a volume
pub(crate) fn out_of_bounds(offset: u64, len: usize, size: u64) -> WalError {
    WalError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
            "access {}..{} outside volume of {} bytes",
            offset,
            offset + len as u64,
            size
        ),
    ))
}
