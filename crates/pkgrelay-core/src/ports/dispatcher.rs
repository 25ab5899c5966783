//! Relay dispatcher port definition.
//!
//! This is the caller-facing interface of the pipeline: enqueue requests,
//! inspect jobs, cancel and clear them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::job::{AssetRequest, Job, JobHandle, JobId, QueueSnapshot, RelayError};
use crate::settings::{DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_TRANSFER_WINDOW};

/// Configuration for creating a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Jobs in flight at once.
    pub max_concurrent: usize,
    /// Capacity for non-terminal jobs.
    pub max_queue_size: u32,
    /// Relay transfer window in bytes.
    pub transfer_window: usize,
    /// Minimum interval between progress events for one job.
    pub progress_interval: Duration,
    /// How often an idle runner re-reads storage for jobs queued or
    /// removed by other processes. `None` never re-reads.
    pub storage_poll: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            transfer_window: DEFAULT_TRANSFER_WINDOW,
            progress_interval: Duration::from_millis(250),
            storage_poll: None,
        }
    }
}

impl DispatcherConfig {
    /// Create a config with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of jobs run at once (minimum 1).
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub const fn with_max_queue_size(mut self, max: u32) -> Self {
        self.max_queue_size = max;
        self
    }

    /// Set the relay transfer window (minimum 1 byte).
    #[must_use]
    pub fn with_transfer_window(mut self, bytes: usize) -> Self {
        self.transfer_window = bytes.max(1);
        self
    }

    /// Set the progress event interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Re-read storage every `interval` while idle.
    #[must_use]
    pub const fn with_storage_poll(mut self, interval: Duration) -> Self {
        self.storage_poll = Some(interval);
        self
    }
}

/// What a cancel call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The job was still queued and has been removed.
    Removed,
    /// The job was running; its worker has been told to stop and the job
    /// will end as `Failed(Cancelled)`.
    Cancelling,
}

/// Port for driving relay jobs.
///
/// # Usage
///
/// ```ignore
/// let dispatcher: Arc<dyn RelayDispatcherPort> = /* ... */;
///
/// let handle = dispatcher
///     .enqueue(AssetRequest::with_defaults("com.example.app", "42"))
///     .await?;
/// let job = dispatcher.get_job(&handle.id).await?;
/// dispatcher.cancel(&handle.id).await?;
/// ```
#[async_trait]
pub trait RelayDispatcherPort: Send + Sync {
    /// Queue a request. Idempotent for equal pending or active requests.
    async fn enqueue(&self, request: AssetRequest) -> Result<JobHandle, RelayError>;

    /// Look up one job.
    async fn get_job(&self, id: &JobId) -> Result<Job, RelayError>;

    /// Every job in queue order.
    async fn list_jobs(&self) -> Result<Vec<Job>, RelayError>;

    /// Current queue snapshot.
    async fn snapshot(&self) -> Result<QueueSnapshot, RelayError>;

    /// Cancel a queued or running job.
    async fn cancel(&self, id: &JobId) -> Result<CancelOutcome, RelayError>;

    /// Cancel all running jobs and remove all queued ones.
    async fn cancel_all(&self) -> Result<usize, RelayError>;

    /// Drop one terminal job.
    async fn clear(&self, id: &JobId) -> Result<(), RelayError>;

    /// Drop every terminal job.
    async fn clear_terminal(&self) -> Result<usize, RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.transfer_window, 16 * 1024);
    }

    #[test]
    fn builder_clamps_zero_values() {
        let config = DispatcherConfig::new()
            .with_max_concurrent(0)
            .with_transfer_window(0);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.transfer_window, 1);
    }
}
