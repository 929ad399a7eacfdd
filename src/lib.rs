//! # mapwal
//!
//! Write-ahead log for an embedded storage engine:
//! - Checksummed binary instruction stream (long, byte array, record, tombstone)
//! - Lock-free, page-aware space allocation for concurrent appenders
//! - Sealed file rotation with ordered flushes
//! - Crash replay into a caller supplied sink
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Store layers (callers)                     │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │ append_*                      │ open / replay
//!                ▼                               ▼
//!   ┌────────────────────────┐        ┌────────────────────────┐
//!   │     Append Engine      │        │     Replay Engine      │
//!   │ (atomic cursor + skip) │        │ (WalReader → sink)     │
//!   └───────────┬────────────┘        └───────────┬────────────┘
//!               │                                 │
//!               ▼                                 ▼
//!   ┌─────────────────────────────────────────────────────────┐
//!   │        File lifecycle (rotate / seal / destroy)         │
//!   └───────────────────────────┬─────────────────────────────┘
//!                               ▼
//!                    ┌─────────────────────┐
//!                    │  Volume (bytes on   │
//!                    │  disk or in memory) │
//!                    └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod volume;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{WalError, Result};
pub use config::WalConfig;
pub use wal::{NoReplay, ReplaySink, ReplayStats, WalPointer, WriteAheadLog};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of mapwal
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
