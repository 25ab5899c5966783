//! Acquisition results.
//!
//! An acquired asset is always a streaming reader: bytes are pulled
//! incrementally by the relay transport and never buffered whole.

use std::fmt;

use tokio::io::AsyncRead;

use crate::job::UnavailableReason;

/// Incremental byte source for an asset.
pub type AssetStream = Box<dyn AsyncRead + Send + Unpin>;

/// Outcome of one acquisition strategy.
pub enum AcquisitionResult {
    /// Bytes from the remote distribution service.
    RemoteStream {
        /// Content reader.
        stream: AssetStream,
        /// Size announced by the service, if any.
        declared_length: Option<u64>,
    },
    /// Bytes from a locally installed copy.
    LocalStream {
        /// Content reader.
        stream: AssetStream,
        /// Size of the installed binary.
        length: u64,
        /// Version of the installed copy (may differ from the request).
        installed_version: String,
    },
    /// The strategy could not produce bytes.
    Unavailable(UnavailableReason),
}

impl AcquisitionResult {
    /// Whether this result carries a stream.
    pub const fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }

    /// Split into the stream and its known length.
    ///
    /// Returns `Err` with the reason for `Unavailable`.
    pub fn into_stream(self) -> Result<(AssetStream, Option<u64>), UnavailableReason> {
        match self {
            Self::RemoteStream {
                stream,
                declared_length,
            } => Ok((stream, declared_length)),
            Self::LocalStream { stream, length, .. } => Ok((stream, Some(length))),
            Self::Unavailable(reason) => Err(reason),
        }
    }
}

impl fmt::Debug for AcquisitionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteStream {
                declared_length, ..
            } => f
                .debug_struct("RemoteStream")
                .field("declared_length", declared_length)
                .finish_non_exhaustive(),
            Self::LocalStream {
                length,
                installed_version,
                ..
            } => f
                .debug_struct("LocalStream")
                .field("length", length)
                .field("installed_version", installed_version)
                .finish_non_exhaustive(),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}
