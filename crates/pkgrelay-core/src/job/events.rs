//! Relay events.

use serde::{Deserialize, Serialize};

use super::failure::FailureReason;
use super::types::{JobId, JobState};

/// Byte counters for an in-flight upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Bytes handed to the outbound request so far.
    pub sent: u64,
    /// Declared size, if the source knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl TransferProgress {
    /// Completion as a percentage, when the total is known and non-zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|t| *t > 0)
            .map(|t| (self.sent as f64 / t as f64) * 100.0)
    }
}

/// Single discriminated union for all relay events.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A job was created or re-enqueued.
    JobQueued {
        /// Job id.
        id: JobId,
        /// Target path on the relay endpoint.
        destination: String,
    },

    /// A job changed state.
    JobStateChanged {
        /// Job id.
        id: JobId,
        /// New state.
        state: JobState,
        /// Failure detail when the new state is `Failed`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<FailureReason>,
    },

    /// Upload progress (rate-limited).
    RelayProgress {
        /// Job id.
        id: JobId,
        /// Byte counters.
        progress: TransferProgress,
    },

    /// The local copy being relayed is not the requested version.
    VersionMismatch {
        /// Job id.
        id: JobId,
        /// Version the caller asked for.
        requested: String,
        /// Version actually installed.
        installed: String,
    },

    /// A queued job was removed without running.
    JobRemoved {
        /// Job id.
        id: JobId,
    },
}

impl RelayEvent {
    /// Create a state change event.
    pub const fn state_changed(id: JobId, state: JobState) -> Self {
        Self::JobStateChanged {
            id,
            state,
            error: None,
        }
    }

    /// Create a failure event.
    pub const fn failed(id: JobId, error: FailureReason) -> Self {
        Self::JobStateChanged {
            id,
            state: JobState::Failed,
            error: Some(error),
        }
    }

    /// The job this event concerns.
    pub const fn job_id(&self) -> JobId {
        match self {
            Self::JobQueued { id, .. }
            | Self::JobStateChanged { id, .. }
            | Self::RelayProgress { id, .. }
            | Self::VersionMismatch { id, .. }
            | Self::JobRemoved { id } => *id,
        }
    }
}
