//! Failure detail recorded on jobs.
//!
//! These types are serializable so they can be persisted with the job
//! record and shown to callers verbatim after a restart.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single acquisition strategy could not produce a stream.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// Credential missing, expired or rejected after one refresh.
    #[error("authentication failed: {message}")]
    AuthError {
        /// Detail from the credential store or remote service.
        message: String,
    },

    /// The remote service has no entry for the requested asset.
    #[error("not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// The remote service refused to grant the requested version.
    #[error("entitlement denied: {message}")]
    Denied {
        /// Detail from the remote service.
        message: String,
    },

    /// No local copy of the asset is installed.
    #[error("not installed locally")]
    NotInstalled,

    /// Network fault talking to the remote service.
    #[error("service unreachable: {message}")]
    Unreachable {
        /// Underlying network error.
        message: String,
    },

    /// Local I/O failure while opening an installed copy.
    #[error("local I/O error: {message}")]
    Io {
        /// Underlying I/O error.
        message: String,
    },
}

impl UnavailableReason {
    /// Create an auth error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a denied error.
    pub fn denied(message: impl Into<String>) -> Self {
        Self::Denied {
            message: message.into(),
        }
    }

    /// Create an unreachable error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    /// Create a local I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

/// One strategy's answer during a chain run that produced nothing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrategyAttempt {
    /// Strategy name (`remote`, `local`).
    pub strategy: String,
    /// Why it was unavailable.
    pub reason: UnavailableReason,
}

/// Terminal failure recorded on a `Failed` job.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Every strategy in the chain was unavailable; no relay was attempted.
    #[error("no source available ({})", summarize(.attempts))]
    NoSourceAvailable {
        /// Per-strategy reasons in chain order.
        attempts: Vec<StrategyAttempt>,
    },

    /// The relay upload failed.
    #[error("relay failed{}: {cause}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Transport {
        /// HTTP status if the endpoint answered.
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        /// Underlying cause.
        cause: String,
    },

    /// Cancelled by the caller.
    #[error("cancelled")]
    Cancelled,

    /// The job was active when the process stopped.
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl FailureReason {
    /// Create a transport failure.
    pub fn transport(status: Option<u16>, cause: impl Into<String>) -> Self {
        Self::Transport {
            status,
            cause: cause.into(),
        }
    }

    /// Check if this failure was a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn summarize(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.strategy, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}
