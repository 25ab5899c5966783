//! Directory-backed package registry.
//!
//! Layout under the registry root:
//!
//! ```text
//! {root}/{asset_id}/package.json   {"version": "41", "binary": "base.bin"}
//! {root}/{asset_id}/base.bin
//! ```
//!
//! `binary` defaults to [`DEFAULT_BINARY`] and must be a plain file name
//! inside the asset directory.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use pkgrelay_core::{InstalledBinary, LocalPackageRegistry, RegistryError};

/// Manifest file name inside each asset directory.
pub const MANIFEST_FILE: &str = "package.json";

const DEFAULT_BINARY: &str = "base.bin";

#[derive(Debug, Deserialize)]
struct PackageManifest {
    version: String,
    #[serde(default = "default_binary")]
    binary: String,
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

/// Reads installed packages from a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryPackageRegistry {
    root: PathBuf,
}

impl DirectoryPackageRegistry {
    /// Create a registry rooted at `root`. The directory need not exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The registry root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for an asset, or `None` if the id would escape the root.
    fn asset_dir(&self, asset_id: &str) -> Option<PathBuf> {
        let safe = !asset_id.is_empty()
            && asset_id != "."
            && asset_id != ".."
            && !asset_id.contains(['/', '\\']);
        safe.then(|| self.root.join(asset_id))
    }

    async fn read_manifest(&self, asset_id: &str) -> Result<Option<(PathBuf, PackageManifest)>, RegistryError> {
        let Some(dir) = self.asset_dir(asset_id) else {
            return Ok(None);
        };
        let raw = match tokio::fs::read_to_string(dir.join(MANIFEST_FILE)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RegistryError::Io(e.to_string())),
        };
        let manifest: PackageManifest =
            serde_json::from_str(&raw).map_err(|e| invalid(asset_id, e.to_string()))?;

        if manifest.version.trim().is_empty() {
            return Err(invalid(asset_id, "empty version"));
        }
        let binary = Path::new(&manifest.binary);
        if binary.file_name().is_none_or(|name| name != binary.as_os_str()) {
            return Err(invalid(asset_id, format!("binary must be a file name, got {}", manifest.binary)));
        }
        Ok(Some((dir, manifest)))
    }
}

fn invalid(asset_id: &str, message: impl Into<String>) -> RegistryError {
    RegistryError::InvalidManifest {
        asset_id: asset_id.to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl LocalPackageRegistry for DirectoryPackageRegistry {
    async fn is_installed(&self, asset_id: &str) -> Result<bool, RegistryError> {
        Ok(self.read_manifest(asset_id).await?.is_some())
    }

    async fn installed_version(&self, asset_id: &str) -> Result<Option<String>, RegistryError> {
        Ok(self
            .read_manifest(asset_id)
            .await?
            .map(|(_, manifest)| manifest.version))
    }

    async fn open_installed_binary(&self, asset_id: &str) -> Result<InstalledBinary, RegistryError> {
        let (dir, manifest) = self
            .read_manifest(asset_id)
            .await?
            .ok_or_else(|| RegistryError::NotInstalled(asset_id.to_string()))?;
        let path = dir.join(&manifest.binary);

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                invalid(asset_id, format!("binary {} is missing", manifest.binary))
            } else {
                RegistryError::Io(e.to_string())
            }
        })?;
        let length = file
            .metadata()
            .await
            .map_err(|e| RegistryError::Io(e.to_string()))?
            .len();

        tracing::debug!(target: "pkgrelay.acquire", asset_id, path = %path.display(), length, "Opened installed binary");
        Ok(InstalledBinary {
            stream: Box::new(file),
            length,
        })
    }
}
