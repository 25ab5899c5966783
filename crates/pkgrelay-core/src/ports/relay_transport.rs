//! Relay transport port.
//!
//! Streams an acquired asset to the private relay endpoint. Implementations
//! must read the source through a bounded window so memory use does not
//! depend on asset size, and must drop the source on every exit path.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::acquisition::AssetStream;
use crate::job::{FailureReason, TransferProgress};

/// An upload to perform.
pub struct RelayPayload {
    /// Source bytes.
    pub stream: AssetStream,
    /// Size of the source, if known; sent as `Content-Length`.
    pub length: Option<u64>,
    /// Receives byte counters as chunks are handed to the request body.
    pub progress: Option<watch::Sender<TransferProgress>>,
}

impl RelayPayload {
    /// Create a payload without progress reporting.
    pub fn new(stream: AssetStream, length: Option<u64>) -> Self {
        Self {
            stream,
            length,
            progress: None,
        }
    }

    /// Report progress through a watch channel.
    #[must_use]
    pub fn with_progress(mut self, progress: watch::Sender<TransferProgress>) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl fmt::Debug for RelayPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayPayload")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Acknowledgement of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReceipt {
    /// Relative path the endpoint stored the asset under.
    pub destination: String,
    /// Total bytes sent.
    pub bytes_sent: u64,
    /// Largest single chunk held in memory during the transfer.
    pub peak_chunk: usize,
    /// HTTP status returned by the endpoint.
    pub status: u16,
}

/// Relay upload failure.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// The endpoint answered with a non-2xx status.
    #[error("relay endpoint returned status {status}: {body}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// Network or source-stream failure.
    #[error("relay I/O failure: {0}")]
    Io(String),

    /// No relay credential could be obtained.
    #[error("relay credential unavailable: {0}")]
    Credential(String),

    /// Endpoint configuration is unusable.
    #[error("invalid relay endpoint: {0}")]
    InvalidEndpoint(String),
}

impl TransportError {
    /// HTTP status, when the endpoint answered.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for FailureReason {
    fn from(err: TransportError) -> Self {
        Self::transport(err.status(), err.to_string())
    }
}

/// Port for streaming assets to the relay endpoint.
#[async_trait]
pub trait RelayTransportPort: Send + Sync {
    /// Upload `payload` to `destination` (a relative path).
    async fn relay(
        &self,
        destination: &str,
        payload: RelayPayload,
    ) -> Result<RelayReceipt, TransportError>;
}
