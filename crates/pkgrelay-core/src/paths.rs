//! Data path resolution.
//!
//! All on-disk state lives under one data root:
//!
//! - `{root}/pkgrelay.db` for the job queue and credential cache
//! - `{root}/credential.key` for the credential cache encryption key
//! - `{root}/runner.lock`, held by the one process running the queue

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "PKGRELAY_DATA_DIR";

const DATABASE_FILE: &str = "pkgrelay.db";
const KEY_FILE: &str = "credential.key";
const RUNNER_LOCK_FILE: &str = "runner.lock";

/// Errors that can occur during path resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Could not determine the system data directory.
    #[error("Cannot determine system data directory")]
    NoDataDir,

    /// A path was expected to be a directory but was not.
    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },
}

/// Get the root directory for application data.
///
/// Resolution order:
/// 1. `explicit` (e.g. a CLI flag)
/// 2. `PKGRELAY_DATA_DIR` environment variable
/// 3. System data directory (e.g., `~/.local/share/pkgrelay`)
///
/// The directory is created if it doesn't exist.
pub fn data_root(explicit: Option<&Path>) -> Result<PathBuf, PathError> {
    let root = match explicit {
        Some(path) => path.to_path_buf(),
        None => match std::env::var_os(DATA_DIR_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => dirs::data_dir().ok_or(PathError::NoDataDir)?.join("pkgrelay"),
        },
    };
    ensure_dir(&root)?;
    Ok(root)
}

fn ensure_dir(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Every path the application uses, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Data root.
    pub data_root: PathBuf,
    /// `SQLite` database file.
    pub database: PathBuf,
    /// Credential cache key file.
    pub credential_key: PathBuf,
    /// Lock file for the queue runner.
    pub runner_lock: PathBuf,
}

impl ResolvedPaths {
    /// Resolve paths under the data root (see [`data_root`]).
    pub fn resolve(explicit_root: Option<&Path>) -> Result<Self, PathError> {
        let data_root = data_root(explicit_root)?;
        Ok(Self::under(data_root))
    }

    /// Lay out paths under an already-existing root.
    pub fn under(data_root: PathBuf) -> Self {
        Self {
            database: data_root.join(DATABASE_FILE),
            credential_key: data_root.join(KEY_FILE),
            runner_lock: data_root.join(RUNNER_LOCK_FILE),
            data_root,
        }
    }
}

impl fmt::Display for ResolvedPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data_root = {}", self.data_root.display())?;
        writeln!(f, "database = {}", self.database.display())?;
        writeln!(f, "credential_key = {}", self.credential_key.display())?;
        write!(f, "runner_lock = {}", self.runner_lock.display())
    }
}
