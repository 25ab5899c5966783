//! Remote distribution service port.
//!
//! The remote fetch protocol is modeled as four typed steps. Only their
//! results matter to the pipeline; wire encoding is an adapter concern.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acquisition::AssetStream;
use crate::credentials::{AuthError, Credential};
use crate::job::UnavailableReason;

/// Device description presented at checkin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Device model name.
    pub model: String,
    /// Manufacturer.
    pub manufacturer: String,
    /// Platform API level.
    pub sdk_version: u32,
    /// Build fingerprint.
    pub fingerprint: String,
    /// Preferred locale.
    pub locale: String,
    /// Supported ABIs in preference order.
    pub abis: Vec<String>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            model: "Pixel 6".to_string(),
            manufacturer: "Google".to_string(),
            sdk_version: 33,
            fingerprint: "google/oriole/oriole:13/TQ3A.230901.001/10750268:user/release-keys"
                .to_string(),
            locale: "en_US".to_string(),
            abis: vec!["arm64-v8a".to_string(), "armeabi-v7a".to_string()],
        }
    }
}

/// Opaque device identity issued at checkin.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an issued id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceId(<redacted>)")
    }
}

/// Authenticated session produced by checkin and used by later steps.
#[derive(Debug, Clone)]
pub struct DistributionSession {
    /// The distribution credential the checkin succeeded with.
    pub credential: Credential,
    /// Device identity.
    pub device_id: DeviceId,
}

/// Canonical remote entry for an asset on a channel/variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Canonical document id on the remote service.
    pub doc_id: String,
    /// Channel the entry was resolved for.
    pub channel: String,
    /// Variant the entry was resolved for.
    pub variant: String,
    /// Latest version the service advertises.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Permission to fetch a specific version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementGrant {
    /// Version the grant covers.
    pub version: String,
    /// Opaque grant token passed to the content step.
    pub grant_token: String,
}

/// Streamed content of an entitled version.
pub struct RemoteContent {
    /// Content reader.
    pub stream: AssetStream,
    /// Size announced by the service.
    pub length: Option<u64>,
}

impl fmt::Debug for RemoteContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteContent")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Failures of the distribution service steps.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DistributionError {
    /// Credential missing, expired or rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The asset or version is unknown to the service.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service refused to grant the version.
    #[error("denied: {0}")]
    Denied(String),

    /// Network fault or unexpected response.
    #[error("unreachable: {0}")]
    Unreachable(String),
}

impl From<DistributionError> for UnavailableReason {
    fn from(err: DistributionError) -> Self {
        match err {
            DistributionError::Auth(e) => Self::auth(e.to_string()),
            DistributionError::NotFound(m) => Self::not_found(m),
            DistributionError::Denied(m) => Self::denied(m),
            DistributionError::Unreachable(m) => Self::unreachable(m),
        }
    }
}

/// Port for the remote distribution service.
#[async_trait]
pub trait DistributionServicePort: Send + Sync {
    /// Establish a device identity with the given credential.
    async fn checkin(
        &self,
        credential: &Credential,
        profile: &DeviceProfile,
    ) -> Result<DeviceId, DistributionError>;

    /// Resolve an asset to its canonical entry for a channel and variant.
    async fn metadata(
        &self,
        session: &DistributionSession,
        asset_id: &str,
        channel: &str,
        variant: &str,
    ) -> Result<RemoteEntry, DistributionError>;

    /// Request a grant for a version of an entry.
    async fn entitlement(
        &self,
        session: &DistributionSession,
        entry: &RemoteEntry,
        version: &str,
    ) -> Result<EntitlementGrant, DistributionError>;

    /// Open a streamed byte source for an entitled version.
    async fn content(
        &self,
        session: &DistributionSession,
        entry: &RemoteEntry,
        grant: &EntitlementGrant,
    ) -> Result<RemoteContent, DistributionError>;
}
