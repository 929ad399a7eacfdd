//! WAL Replay
//!
//! Handles crash recovery by replaying sealed log files into a sink.
//!
//! Files are scanned in rotation order, each from its first instruction to
//! its EOF. The first unsealed or short file ends the replay: a crash
//! interrupted it, so neither it nor anything after it can be trusted.
//! A checksum failure aborts replay with a corruption error and leaves
//! the files on disk untouched.

use tracing::{error, info, warn};

use crate::error::Result;
use crate::volume::Volume;

use super::files::WriteAheadLog;
use super::instruction::Instruction;
use super::reader::WalReader;

/// Receives the operations recovered from the log
pub trait ReplaySink {
    /// Called once before the first instruction
    fn before_replay_start(&mut self) {}

    fn write_long(&mut self, offset: u64, value: u64);

    fn write_byte_array(&mut self, offset: u64, data: &[u8]);

    /// `None` is a null record, distinct from an empty one
    fn write_record(&mut self, record_id: u64, data: Option<&[u8]>);

    fn write_tombstone(&mut self, record_id: u64);

    /// Called after the last instruction, before the log files are deleted
    fn before_destroy_wal(&mut self) {}
}

/// Sink that ignores everything, for discard-only scans
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReplay;

impl ReplaySink for NoReplay {
    fn write_long(&mut self, _offset: u64, _value: u64) {}

    fn write_byte_array(&mut self, _offset: u64, _data: &[u8]) {}

    fn write_record(&mut self, _record_id: u64, _data: Option<&[u8]>) {}

    fn write_tombstone(&mut self, _record_id: u64) {}
}

/// Result of a replay
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Number of sealed files replayed to their EOF
    pub files_replayed: usize,

    pub longs: u64,
    pub byte_arrays: u64,
    pub records: u64,
    pub tombstones: u64,

    /// Padding bytes stepped over
    pub skipped_bytes: u64,

    /// Index of the unsealed file that ended replay early, if any
    pub stopped_at_file: Option<usize>,
}

impl ReplayStats {
    /// Total number of operations delivered to the sink
    pub fn operations(&self) -> u64 {
        self.longs + self.byte_arrays + self.records + self.tombstones
    }
}

impl WriteAheadLog {
    /// Replay every sealed file into `sink`, then delete all log files.
    pub fn replay_wal(&mut self, sink: &mut dyn ReplaySink) -> Result<ReplayStats> {
        sink.before_replay_start();
        info!(files = self.volumes.len(), "Replaying WAL");

        let mut stats = ReplayStats::default();
        for (index, volume) in self.volumes.iter().enumerate() {
            if !WalReader::is_sealed(volume.as_ref())? {
                warn!(
                    file = index,
                    length = volume.length(),
                    "WAL file is not sealed, ignoring it and all later files"
                );
                stats.stopped_at_file = Some(index);
                break;
            }

            if let Err(e) = replay_file(volume.as_ref(), index, sink, &mut stats) {
                error!(file = index, error = %e, "WAL replay failed");
                return Err(e);
            }
            stats.files_replayed += 1;
        }

        sink.before_destroy_wal();
        self.destroy_files()?;

        info!(
            files = stats.files_replayed,
            operations = stats.operations(),
            stopped_at_file = ?stats.stopped_at_file,
            "WAL replay finished"
        );
        Ok(stats)
    }
}

fn replay_file(
    volume: &dyn Volume,
    index: usize,
    sink: &mut dyn ReplaySink,
    stats: &mut ReplayStats,
) -> Result<()> {
    let mut reader = WalReader::new(volume, index);
    while let Some(entry) = reader.next_instruction()? {
        match entry.instruction {
            Instruction::Eof => break,
            Instruction::Long { offset, value } => {
                sink.write_long(offset, value);
                stats.longs += 1;
            }
            Instruction::ByteArray { offset, data } => {
                sink.write_byte_array(offset, &data);
                stats.byte_arrays += 1;
            }
            Instruction::Record { record_id, data } => {
                sink.write_record(record_id, data.as_deref());
                stats.records += 1;
            }
            Instruction::Tombstone { record_id } => {
                sink.write_tombstone(record_id);
                stats.tombstones += 1;
            }
            Instruction::SkipMany { .. } | Instruction::SkipSingle => {
                stats.skipped_bytes += entry.len;
            }
        }
    }
    Ok(())
}
