//! File-backed volume
//!
//! One `std::fs::File` per volume, serialized behind a Mutex. Growth is
//! explicit via `set_len`; the cached length lives under the same lock.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, WalError};

use super::{out_of_bounds, Volume, VolumeFactory};

struct OpenFile {
    file: File,
    len: u64,
}

/// Volume stored in a file on disk
pub struct FileVolume {
    path: PathBuf,
    /// `None` once closed
    inner: Mutex<Option<OpenFile>>,
    read_only: bool,
}

impl FileVolume {
    /// Open `path` for reading and writing, creating it if missing
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, false)
    }

    /// Open an existing file without write access (inspection tools)
    pub fn open_read_only(path: &Path) -> Result<Self> {
        Self::open_with(path, true)
    }

    fn open_with(path: &Path, read_only: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .create(!read_only)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Some(OpenFile { file, len })),
            read_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut OpenFile) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        match guard.as_mut() {
            Some(open) => f(open),
            None => Err(WalError::VolumeClosed),
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is open read-only", self.path.display()),
            )));
        }
        Ok(())
    }
}

impl Volume for FileVolume {
    fn ensure_available(&self, min_size: u64) -> Result<()> {
        self.with_file(|open| {
            if open.len < min_size {
                self.check_writable()?;
                open.file.set_len(min_size)?;
                open.len = min_size;
            }
            Ok(())
        })
    }

    fn put_data(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        self.with_file(|open| {
            if offset + data.len() as u64 > open.len {
                return Err(out_of_bounds(offset, data.len(), open.len));
            }
            open.file.seek(SeekFrom::Start(offset))?;
            open.file.write_all(data)?;
            Ok(())
        })
    }

    fn get_data(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.with_file(|open| {
            if offset + buf.len() as u64 > open.len {
                return Err(out_of_bounds(offset, buf.len(), open.len));
            }
            open.file.seek(SeekFrom::Start(offset))?;
            open.file.read_exact(buf)?;
            Ok(())
        })
    }

    fn length(&self) -> u64 {
        self.inner.lock().as_ref().map_or(0, |open| open.len)
    }

    fn sync(&self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.with_file(|open| Ok(open.file.sync_all()?))
    }

    fn truncate(&self, size: u64) -> Result<()> {
        self.check_writable()?;
        self.with_file(|open| {
            open.file.set_len(size)?;
            open.len = size;
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        // dropping the handle closes it
        self.inner.lock().take();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }

    fn delete_file(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Opens a FileVolume per log file
#[derive(Debug, Default, Clone, Copy)]
pub struct FileVolumeFactory;

impl VolumeFactory for FileVolumeFactory {
    fn make_volume(&self, path: Option<&Path>) -> Result<Arc<dyn Volume>> {
        let path = path.ok_or_else(|| WalError::Config("file volumes need a path".to_string()))?;
        Ok(Arc::new(FileVolume::open(path)?))
    }
}
