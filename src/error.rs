//! Error types for the write-ahead log
//!
//! Provides a unified error type for all operations. Corruption is kept
//! apart from I/O so callers can tell an inconsistent log from a failing disk.

use thiserror::Error;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Volume is closed")]
    VolumeClosed,

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected in file {file} at offset {offset}: {reason}")]
    Corruption {
        file: usize,
        offset: u64,
        reason: String,
    },

    #[error("WAL corruption detected: rotated to file {actual}, but {expected} files are open")]
    RotationOutOfOrder { expected: usize, actual: usize },

    // -------------------------------------------------------------------------
    // Encoding Errors
    // -------------------------------------------------------------------------
    #[error("{field} out of range: {value} (max {max})")]
    Range {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("Instruction of {size} bytes does not fit in a {page_size} byte page")]
    InstructionTooLarge { size: u64, page_size: u64 },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("No active WAL file, call start_next_file first")]
    NoActiveFile,

    #[error("WAL file {0} is not open")]
    UnknownFile(usize),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalError {
    /// True when the error means the log itself is inconsistent, as opposed
    /// to the storage underneath it failing.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            WalError::Corruption { .. } | WalError::RotationOutOfOrder { .. }
        )
    }

    pub(crate) fn corruption(file: usize, offset: u64, reason: impl Into<String>) -> Self {
        WalError::Corruption {
            file,
            offset,
            reason: reason.into(),
        }
    }

    /// Checks that `value` fits in `max`, otherwise returns a range error
    pub(crate) fn check_range(field: &'static str, value: u64, max: u64) -> Result<()> {
        if value > max {
            return Err(WalError::Range { field, value, max });
        }
        Ok(())
    }
}
