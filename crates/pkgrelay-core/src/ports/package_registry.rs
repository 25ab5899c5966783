//! Local package registry port.
//!
//! Answers whether a copy of an asset is installed on this device and
//! opens its binary for streaming.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::acquisition::AssetStream;
use crate::job::UnavailableReason;

/// Errors from registry lookups.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No installed copy of the asset.
    #[error("{0} is not installed")]
    NotInstalled(String),

    /// The installed copy's metadata could not be read.
    #[error("invalid package manifest for {asset_id}: {message}")]
    InvalidManifest {
        /// Asset whose manifest is broken.
        asset_id: String,
        /// Parse or validation error.
        message: String,
    },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<RegistryError> for UnavailableReason {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotInstalled(_) => Self::NotInstalled,
            other => Self::io(other.to_string()),
        }
    }
}

/// An opened installed binary.
pub struct InstalledBinary {
    /// Content reader.
    pub stream: AssetStream,
    /// Size in bytes.
    pub length: u64,
}

impl fmt::Debug for InstalledBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledBinary")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Port for querying locally installed packages.
#[async_trait]
pub trait LocalPackageRegistry: Send + Sync {
    /// Whether any version of the asset is installed.
    async fn is_installed(&self, asset_id: &str) -> Result<bool, RegistryError>;

    /// Version of the installed copy, if installed.
    async fn installed_version(&self, asset_id: &str) -> Result<Option<String>, RegistryError>;

    /// Open the installed binary for streaming.
    async fn open_installed_binary(&self, asset_id: &str) -> Result<InstalledBinary, RegistryError>;
}
