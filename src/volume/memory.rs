//! In-memory volume
//!
//! Vec-backed volume with RwLock for concurrency. Used when the log has no
//! base path and in tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, WalError};

use super::{out_of_bounds, Volume, VolumeFactory};

/// Volume held entirely in memory
#[derive(Default)]
pub struct MemoryVolume {
    data: RwLock<Vec<u8>>,
    closed: AtomicBool,
}

impl MemoryVolume {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WalError::VolumeClosed);
        }
        Ok(())
    }
}

impl Volume for MemoryVolume {
    fn ensure_available(&self, min_size: u64) -> Result<()> {
        self.check_open()?;
        let mut data = self.data.write();
        if (data.len() as u64) < min_size {
            data.resize(min_size as usize, 0);
        }
        Ok(())
    }

    fn put_data(&self, offset: u64, src: &[u8]) -> Result<()> {
        self.check_open()?;
        let mut data = self.data.write();
        let start = offset as usize;
        let end = start + src.len();
        if end > data.len() {
            return Err(out_of_bounds(offset, src.len(), data.len() as u64));
        }
        data[start..end].copy_from_slice(src);
        Ok(())
    }

    fn get_data(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        let data = self.data.read();
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(out_of_bounds(offset, buf.len(), data.len() as u64));
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn length(&self) -> u64 {
        self.data.read().len() as u64
    }

    fn sync(&self) -> Result<()> {
        self.check_open()
    }

    fn truncate(&self, size: u64) -> Result<()> {
        self.check_open()?;
        self.data.write().truncate(size as usize);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let mut data = self.data.write();
        data.clear();
        data.shrink_to_fit();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn delete_file(&self) -> Result<()> {
        Ok(())
    }
}

/// Hands out a fresh MemoryVolume for every request; paths are ignored
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryVolumeFactory;

impl VolumeFactory for MemoryVolumeFactory {
    fn make_volume(&self, _path: Option<&Path>) -> Result<Arc<dyn Volume>> {
        Ok(Arc::new(MemoryVolume::new()))
    }
}
