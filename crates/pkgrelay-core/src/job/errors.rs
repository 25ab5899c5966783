//! Relay pipeline error types.
//!
//! These errors are serializable and do not wrap external error types;
//! storage failures are captured as strings at the boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::JobState;
use crate::ports::RepositoryError;

/// Error type for queue and dispatcher operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelayError {
    /// The request tuple is malformed.
    #[error("Invalid request: {field} is empty or not path-safe")]
    InvalidRequest {
        /// Offending field name.
        field: String,
    },

    /// Queue is at capacity for non-terminal jobs.
    #[error("Queue full: maximum {max_size} pending jobs allowed")]
    QueueFull {
        /// Maximum queue capacity.
        max_size: u32,
    },

    /// No job with this id exists.
    #[error("Job not found: {id}")]
    JobNotFound {
        /// The missing job id.
        id: String,
    },

    /// The requested state change is not a legal transition.
    #[error("Illegal transition for job {id}: {from} -> {to}")]
    IllegalTransition {
        /// Job id.
        id: String,
        /// Current state.
        from: JobState,
        /// Requested state.
        to: JobState,
    },

    /// The operation needs a terminal job but the job is still live.
    #[error("Job {id} is still {state}")]
    JobNotTerminal {
        /// Job id.
        id: String,
        /// Current state.
        state: JobState,
    },

    /// The operation needs a live job but the job already finished.
    #[error("Job {id} already {state}")]
    AlreadyTerminal {
        /// Job id.
        id: String,
        /// Terminal state.
        state: JobState,
    },

    /// Persistence failed; the in-memory queue was not changed.
    #[error("Storage error: {message}")]
    Storage {
        /// Detail from the repository.
        message: String,
    },
}

impl RelayError {
    /// Create an invalid request error.
    pub fn invalid_request(field: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field: field.into(),
        }
    }

    /// Create a queue full error.
    #[must_use]
    pub const fn queue_full(max_size: u32) -> Self {
        Self::QueueFull { max_size }
    }

    /// Create a job not found error.
    pub fn not_found(id: impl ToString) -> Self {
        Self::JobNotFound { id: id.to_string() }
    }

    /// Create an illegal transition error.
    pub fn illegal_transition(id: impl ToString, from: JobState, to: JobState) -> Self {
        Self::IllegalTransition {
            id: id.to_string(),
            from,
            to,
        }
    }

    /// Create a not-terminal error.
    pub fn not_terminal(id: impl ToString, state: JobState) -> Self {
        Self::JobNotTerminal {
            id: id.to_string(),
            state,
        }
    }

    /// Create an already-terminal error.
    pub fn already_terminal(id: impl ToString, state: JobState) -> Self {
        Self::AlreadyTerminal {
            id: id.to_string(),
            state,
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest { field } => format!("The {field} value is not valid"),
            Self::QueueFull { max_size } => {
                format!("Queue is full ({max_size} jobs). Wait for jobs to finish or clear some.")
            }
            Self::JobNotFound { .. } => "Job not found".to_string(),
            Self::IllegalTransition { .. } | Self::Storage { .. } => self.to_string(),
            Self::JobNotTerminal { state, .. } => {
                format!("Job is still {state}; cancel it first")
            }
            Self::AlreadyTerminal { state, .. } => format!("Job already {state}"),
        }
    }
}

impl From<RepositoryError> for RelayError {
    fn from(err: RepositoryError) -> Self {
        Self::storage(err.to_string())
    }
}
