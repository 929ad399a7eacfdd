//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging of pending
//! writes to the main store.
//!
//! ## Responsibilities
//! - Append checksummed instructions through a lock-free cursor
//! - Keep every instruction inside a single page (skip padding)
//! - Rotate, seal and discard log files
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (16 bytes)                                       │
//! │ ┌───────────────────┬──────────┬──────────────────────┐ │
//! │ │ magic|version (4) │ pad (4)  │ features or SEAL (8) │ │
//! │ └───────────────────┴──────────┴──────────────────────┘ │
//! ├─────────────────────────────────────────────────────────┤
//! │ Instruction stream                                      │
//! │ ┌──────────────────────┬───────────────────────┐        │
//! │ │ kind(4) | checksum(4)│ kind specific payload │ ...    │
//! │ └──────────────────────┴───────────────────────┘        │
//! │ ... EOF                                                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! | Kind        | Payload                                          |
//! |-------------|--------------------------------------------------|
//! | EOF         | none                                             |
//! | LONG        | value (8) + target offset (6)                    |
//! | BYTE_ARRAY  | length (2) + target offset (6) + bytes           |
//! | SKIP_MANY   | skip length (3), the bytes skipped follow        |
//! | SKIP_SINGLE | none                                             |
//! | RECORD      | packed record id + packed (size + 1) + bytes     |
//! | TOMBSTONE   | packed record id                                 |

mod files;
pub mod instruction;
mod pointer;
mod reader;
mod replay;
mod writer;

pub use files::WriteAheadLog;
pub use instruction::{Instruction, InstructionKind};
pub use pointer::WalPointer;
pub use reader::{FileHeader, ReadInstruction, WalReader};
pub use replay::{NoReplay, ReplaySink, ReplayStats};

/// Format version stored in the low half of the header word
pub const WAL_STORE_VERSION: u32 = 100;

/// Header word at offset 0 of every log file
pub const WAL_HEADER: u32 = (0x8A77 << 16) | WAL_STORE_VERSION;

/// Written at `SEAL_OFFSET` once a file is complete and durable
pub const WAL_SEAL: u64 = 8_234_892_392_398_238_983;

/// Offset of the feature bitmap / seal slot
pub const SEAL_OFFSET: u64 = 8;

/// Size of the file header; the instruction stream starts here
pub const FILE_HEADER_SIZE: u64 = 16;
