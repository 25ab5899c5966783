//! Job and request types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::failure::FailureReason;
use crate::settings::{DEFAULT_CHANNEL, DEFAULT_VARIANT};

/// A request to relay one asset build.
///
/// The full tuple defines job identity: two requests that differ only in
/// channel or variant are distinct jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRequest {
    /// Reverse-domain package identifier (e.g. `com.example.app`).
    pub asset_id: String,
    /// Requested version (opaque string, usually a version code).
    pub version: String,
    /// Architecture/ABI variant (e.g. `arm64-v8a`).
    pub variant: String,
    /// Release track (e.g. `release`, `beta`).
    pub channel: String,
}

impl AssetRequest {
    /// Create a request with explicit variant and channel.
    pub fn new(
        asset_id: impl Into<String>,
        version: impl Into<String>,
        variant: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            version: version.into(),
            variant: variant.into(),
            channel: channel.into(),
        }
    }

    /// Create a request using the default variant and channel.
    pub fn with_defaults(asset_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(asset_id, version, DEFAULT_VARIANT, DEFAULT_CHANNEL)
    }

    /// Relative path the relay endpoint stores this asset under.
    ///
    /// Format: `{version}/{channel}/{variant}/{asset_id}.bin`
    pub fn destination_path(&self) -> String {
        format!(
            "{}/{}/{}/{}.bin",
            self.version, self.channel, self.variant, self.asset_id
        )
    }

    /// Check that every field is present and usable as a path segment.
    ///
    /// Values are taken verbatim: surrounding whitespace, separators,
    /// control characters, `.` and `..` are rejected rather than
    /// normalised. Returns the name of the first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        let fields = [
            ("asset_id", &self.asset_id),
            ("version", &self.version),
            ("variant", &self.variant),
            ("channel", &self.channel),
        ];
        for (name, value) in fields {
            let unsafe_segment = value.is_empty()
                || value.trim() != value
                || value.contains(['/', '\\'])
                || value.chars().any(char::is_control)
                || value == "."
                || value == "..";
            if unsafe_segment {
                return Err(name);
            }
        }
        Ok(())
    }
}

impl fmt::Display for AssetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} ({}/{})",
            self.asset_id, self.version, self.channel, self.variant
        )
    }
}

/// Stable handle identifying a job across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Mint a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its hyphenated string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s.trim()).map(Self)
    }

    /// The underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for JobId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Lifecycle state of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the queue.
    Queued,
    /// A worker is running the acquisition chain.
    Acquiring,
    /// Bytes are streaming to the relay endpoint.
    Relaying,
    /// Relay endpoint acknowledged the upload.
    Succeeded,
    /// Terminal failure; see the job's `last_error`.
    Failed,
}

impl JobState {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Acquiring => "acquiring",
            Self::Relaying => "relaying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Parse from string representation.
    ///
    /// Returns `None` for unknown values so corrupt rows are not silently
    /// resurrected as queued work.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "acquiring" => Some(Self::Acquiring),
            "relaying" => Some(Self::Relaying),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// `Succeeded` or `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// A worker currently owns the job.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Relaying)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Forward edges are Queued -> Acquiring -> Relaying -> Succeeded;
    /// any non-terminal state may fail. Re-entering `Queued` only happens
    /// through re-enqueue, which is not a transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Acquiring)
                | (Self::Acquiring, Self::Relaying)
                | (Self::Relaying, Self::Succeeded)
                | (Self::Queued | Self::Acquiring | Self::Relaying, Self::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of relay work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Stable handle.
    pub id: JobId,
    /// What to relay.
    pub request: AssetRequest,
    /// Current lifecycle state.
    pub state: JobState,
    /// Number of times a worker has claimed this job since it was (re)queued.
    pub attempts: u32,
    /// Failure detail for `Failed` jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<FailureReason>,
    /// When the job was first created.
    pub created_at: DateTime<Utc>,
    /// When the job last changed state.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(request: AssetRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            request,
            state: JobState::Queued,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reset a terminal job back to `Queued`, keeping its id.
    #[must_use]
    pub fn requeued(mut self, now: DateTime<Utc>) -> Self {
        self.state = JobState::Queued;
        self.attempts = 0;
        self.last_error = None;
        self.updated_at = now;
        self
    }

    /// Mark a job that was active when the process died.
    #[must_use]
    pub fn interrupted(mut self, now: DateTime<Utc>) -> Self {
        self.state = JobState::Failed;
        self.last_error = Some(FailureReason::Interrupted);
        self.updated_at = now;
        self
    }
}

/// How an enqueue call was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// A new job was created.
    Created,
    /// An equal request was already pending or active; nothing changed.
    Existing,
    /// An equal request had finished; it was reset and moved to the back.
    Requeued,
}

/// Returned to callers of `enqueue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// The job's stable id.
    pub id: JobId,
    /// State at the time the handle was issued.
    pub state: JobState,
    /// Whether the call created, reused or reset a job.
    pub outcome: EnqueueOutcome,
}

/// Point-in-time view of the whole queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Every known job in queue order.
    pub jobs: Vec<Job>,
    /// Number of `Queued` jobs.
    pub pending: usize,
    /// Number of `Acquiring`/`Relaying` jobs.
    pub active: usize,
    /// Capacity for non-terminal jobs.
    pub max_size: u32,
}
