//! Exclusive runner lock.
//!
//! Only one process may run the queue for a data directory: restoring
//! marks every active job as interrupted, which is only correct when no
//! other runner holds those jobs.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::CliError;

/// Advisory lock on `runner.lock`, released when dropped.
#[derive(Debug)]
pub struct RunnerLock {
    _file: File,
    path: PathBuf,
}

impl RunnerLock {
    /// Take the lock without waiting.
    ///
    /// Fails with [`CliError::Busy`] when another process holds it.
    pub fn acquire(path: &Path) -> Result<Self, CliError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;

        file.try_lock_exclusive().map_err(|_| {
            CliError::Busy(format!(
                "another pkgrelay runner is using this data directory (lock: {})",
                path.display()
            ))
        })?;

        tracing::debug!(lock = %path.display(), "Runner lock acquired");
        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
