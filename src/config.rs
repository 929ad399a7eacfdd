//! Configuration for the write-ahead log
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalError};

/// Smallest supported page shift (256 byte pages)
pub const MIN_PAGE_SHIFT: u32 = 8;

/// Largest supported page shift; a page remainder must fit the 24-bit skip length
pub const MAX_PAGE_SHIFT: u32 = 24;

/// Main configuration for a WriteAheadLog instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalConfig {
    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Base name for all log files. `None` keeps every log file in memory.
    /// Files derived from it:
    ///   {base}.wal.0, {base}.wal.1, ...   (log files)
    ///   {base}.wal.c                      (compaction finished marker)
    ///   {base}.wal.r0, {base}.wal.r1, ... (record files written during compaction)
    pub base_path: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Layout Configuration
    // -------------------------------------------------------------------------
    /// log2 of the page size; no instruction crosses a page boundary
    pub page_shift: u32,

    /// Written into the header of every new file until it is sealed
    pub feature_bitmap: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            page_shift: 20, // 1 MB
            feature_bitmap: 0,
        }
    }
}

impl WalConfig {
    /// Create a new config builder
    pub fn builder() -> WalConfigBuilder {
        WalConfigBuilder::default()
    }

    /// Page size in bytes
    pub fn page_size(&self) -> u64 {
        1u64 << self.page_shift
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PAGE_SHIFT..=MAX_PAGE_SHIFT).contains(&self.page_shift) {
            return Err(WalError::Config(format!(
                "page_shift must be between {} and {}, got {}",
                MIN_PAGE_SHIFT, MAX_PAGE_SHIFT, self.page_shift
            )));
        }
        if let Some(base) = &self.base_path {
            if base.file_name().is_none() {
                return Err(WalError::Config(format!(
                    "base_path must name a file, got {}",
                    base.display()
                )));
            }
        }
        Ok(())
    }
}

/// Builder for WalConfig
#[derive(Default)]
pub struct WalConfigBuilder {
    config: WalConfig,
}

impl WalConfigBuilder {
    /// Set the base file name (log files are stored next to it)
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_path = Some(path.into());
        self
    }

    /// Keep log files in memory only
    pub fn in_memory(mut self) -> Self {
        self.config.base_path = None;
        self
    }

    /// Set log2 of the page size
    pub fn page_shift(mut self, shift: u32) -> Self {
        self.config.page_shift = shift;
        self
    }

    /// Set the feature bitmap written into new file headers
    pub fn feature_bitmap(mut self, bitmap: u64) -> Self {
        self.config.feature_bitmap = bitmap;
        self
    }

    pub fn build(self) -> WalConfig {
        self.config
    }
}
