//! Cross-process ownership of the session engine.
//!
//! Only one process at a time may run an engine that mutates a given data
//! directory's timer state. Whoever holds `engine.lock` is that process.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{CoreError, StoreError};

pub const LOCK_FILE: &str = "engine.lock";

/// Exclusive engine lock backed by `<data_dir>/engine.lock`.
/// Released when dropped.
#[derive(Debug)]
pub struct EngineLock {
    _file: File,
    path: PathBuf,
}

impl EngineLock {
    /// Try to take the lock in the data directory (non-blocking).
    ///
    /// # Errors
    /// [`StoreError::EngineBusy`] while another process holds it.
    pub fn acquire() -> Result<Self, CoreError> {
        Ok(Self::acquire_in(&data_dir()?)?)
    }

    /// Try to take the lock in `dir` (non-blocking).
    pub fn acquire_in(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| StoreError::LockFile {
                path: path.clone(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| StoreError::EngineBusy { path: path.clone() })?;

        tracing::debug!(path = %path.display(), "engine lock acquired");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
