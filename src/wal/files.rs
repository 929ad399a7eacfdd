//! WAL file lifecycle
//!
//! Creates, rotates, seals, discovers and destroys the log files.
//!
//! ## Concurrency
//! Appends take `&self` and only touch the atomic cursor and the current
//! volume. Everything here that swaps files takes `&mut self`, so rotation,
//! sealing and replay can never overlap with in-flight appends.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use tracing::{debug, error, info, warn};

use crate::config::WalConfig;
use crate::error::{Result, WalError};
use crate::volume::{FileVolumeFactory, MemoryVolumeFactory, Volume, VolumeFactory};

use super::instruction::{self, InstructionKind};
use super::pointer::POINTER_FILE_MAX;
use super::replay::{ReplaySink, ReplayStats};
use super::{FILE_HEADER_SIZE, SEAL_OFFSET, WAL_HEADER, WAL_SEAL};

/// The write-ahead log: an ordered set of log files plus the append cursor
pub struct WriteAheadLog {
    pub(super) config: WalConfig,
    factory: Arc<dyn VolumeFactory>,

    /// Next free offset in the current file
    pub(super) cursor: CachePadded<AtomicU64>,

    /// Log files in rotation order; the last one is current
    pub(super) volumes: Vec<Arc<dyn Volume>>,

    /// Record files left behind by compaction
    record_volumes: Vec<Arc<dyn Volume>>,

    pub(super) current: Option<Arc<dyn Volume>>,

    /// Index of the current file, `None` before the first rotation
    pub(super) file_num: Option<usize>,
}

impl WriteAheadLog {
    /// Create a log for `config`. Files live next to `config.base_path`,
    /// or in memory when it is `None`.
    pub fn new(config: WalConfig) -> Result<Self> {
        let factory: Arc<dyn VolumeFactory> = if config.base_path.is_some() {
            Arc::new(FileVolumeFactory)
        } else {
            Arc::new(MemoryVolumeFactory)
        };
        Self::with_factory(config, factory)
    }

    /// Create a log that obtains its volumes from `factory`
    pub fn with_factory(config: WalConfig, factory: Arc<dyn VolumeFactory>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            cursor: CachePadded::new(AtomicU64::new(0)),
            volumes: Vec::new(),
            record_volumes: Vec::new(),
            current: None,
            file_num: None,
        })
    }

    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    /// `{base}.wal.{ext}`, or `None` for an in-memory log
    pub fn file_name(&self, ext: &str) -> Option<PathBuf> {
        self.config.base_path().map(|base| {
            let mut name = base.as_os_str().to_os_string();
            name.push(format!(".wal.{}", ext));
            PathBuf::from(name)
        })
    }

    pub fn number_of_files(&self) -> usize {
        self.volumes.len()
    }

    pub fn record_file_count(&self) -> usize {
        self.record_volumes.len()
    }

    pub fn current_file_index(&self) -> Option<usize> {
        self.file_num
    }

    /// Offset the next append in the current file would start at
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    // =========================================================================
    // Rotation and sealing
    // =========================================================================

    /// Rotate to a new log file and make it current
    pub fn start_next_file(&mut self) -> Result<()> {
        let next = self.file_num.map_or(0, |n| n + 1);
        if next != self.volumes.len() {
            error!(
                next,
                open_files = self.volumes.len(),
                "WAL rotation out of order"
            );
            return Err(WalError::RotationOutOfOrder {
                expected: self.volumes.len(),
                actual: next,
            });
        }
        WalError::check_range("file index", next as u64, POINTER_FILE_MAX)?;

        let path = self.file_name(&next.to_string());
        let volume = self.factory.make_volume(path.as_deref())?;
        volume.ensure_available(FILE_HEADER_SIZE)?;
        volume.put_u32(0, WAL_HEADER)?;
        volume.put_u64(SEAL_OFFSET, self.config.feature_bitmap)?;

        self.cursor.store(FILE_HEADER_SIZE, Ordering::Release);
        self.volumes.push(Arc::clone(&volume));
        self.current = Some(volume);
        self.file_num = Some(next);

        info!(file = next, path = ?path, "Started WAL file");
        Ok(())
    }

    /// Finish the current file: EOF marker, flush, seal, flush.
    ///
    /// The EOF is durable before the seal is written, so a crash in between
    /// leaves a file that replay treats as unsealed.
    pub fn seal(&mut self) -> Result<()> {
        let volume = self.current.as_ref().ok_or(WalError::NoActiveFile)?;
        let end = self.cursor.load(Ordering::Acquire);

        volume.ensure_available(end + 1)?;
        volume.put_u8(
            end,
            instruction::header_byte(InstructionKind::Eof, instruction::position_checksum(end)),
        )?;
        volume.sync()?;

        volume.put_u64(SEAL_OFFSET, WAL_SEAL)?;
        volume.sync()?;

        info!(file = ?self.file_num, end, "Sealed WAL file");
        Ok(())
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Replay and discard log files left by a previous run.
    ///
    /// Returns `None` when there was nothing to replay.
    pub fn open(&mut self, sink: &mut dyn ReplaySink) -> Result<Option<ReplayStats>> {
        let (Some(first), Some(compaction_seal)) = (self.file_name("0"), self.file_name("c"))
        else {
            return Ok(None);
        };
        if !compaction_seal.exists() && !first.exists() {
            debug!(path = %first.display(), "No WAL files to replay");
            return Ok(None);
        }

        self.record_volumes = self.discover(|i| format!("r{}", i))?;
        self.volumes = self.discover(|i| i.to_string())?;
        info!(
            files = self.volumes.len(),
            record_files = self.record_volumes.len(),
            "Discovered WAL files from previous run"
        );

        let stats = self.replay_wal(sink)?;

        for volume in self.record_volumes.drain(..) {
            volume.close()?;
        }
        Ok(Some(stats))
    }

    /// Open `{base}.wal.{ext(0)}`, `{base}.wal.{ext(1)}`, ... until one is missing
    fn discover(&self, ext: impl Fn(usize) -> String) -> Result<Vec<Arc<dyn Volume>>> {
        let mut found = Vec::new();
        for i in 0.. {
            match self.file_name(&ext(i)) {
                Some(path) if path.exists() => {
                    found.push(self.factory.make_volume(Some(&path))?);
                }
                _ => break,
            }
        }
        Ok(found)
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Release every open file handle
    pub fn close(&mut self) -> Result<()> {
        for volume in self.record_volumes.drain(..) {
            volume.close()?;
        }
        for volume in self.volumes.drain(..) {
            volume.close()?;
        }
        self.current = None;
        self.file_num = None;
        Ok(())
    }

    /// Best-effort close used when constructing the owning store failed
    pub fn init_failed_close_files(&mut self) {
        for volume in self.record_volumes.drain(..).chain(self.volumes.drain(..)) {
            if volume.is_closed() {
                continue;
            }
            if let Err(e) = volume.close() {
                warn!(error = %e, "Failed to close WAL file during cleanup");
            }
        }
        self.current = None;
        self.file_num = None;
    }

    /// Truncate, close and delete every log file, then reset to the empty state.
    ///
    /// Every file is attempted even if an earlier one fails; the log is left
    /// empty and ready for `start_next_file` either way. Returns the first
    /// error encountered.
    pub(super) fn destroy_files(&mut self) -> Result<()> {
        self.current = None;
        self.file_num = None;
        self.cursor.store(0, Ordering::Release);

        let mut first_error = None;
        for (index, volume) in std::mem::take(&mut self.volumes).into_iter().enumerate() {
            match destroy_volume(volume.as_ref()) {
                Ok(()) => debug!(file = index, "Deleted WAL file"),
                Err(e) => {
                    warn!(file = index, error = %e, "Failed to delete WAL file");
                    if !volume.is_closed() {
                        let _ = volume.close();
                    }
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn destroy_volume(volume: &dyn Volume) -> Result<()> {
    if !volume.is_closed() {
        volume.truncate(0)?;
        volume.close()?;
    }
    volume.delete_file()
}
