//! Job repository port definition.
//!
//! This port defines the interface for persisting relay jobs. Every queue
//! mutation is written through this port before it is applied in memory,
//! so the persisted queue is never behind what callers have observed.
//!
//! # Design
//!
//! - Persists the full job record, including terminal results
//! - Transfer progress stays in-memory (high churn, not worth persisting)
//! - Insertion order is preserved by a storage-side sequence number;
//!   re-enqueueing a terminal job moves it to the back

use async_trait::async_trait;

use super::RepositoryError;
use crate::job::{Job, JobId};

/// Port for persisting relay jobs.
#[async_trait]
pub trait JobRepositoryPort: Send + Sync {
    /// Insert a new job, or reset an existing one (same id) to the values
    /// given and move it to the back of the queue order.
    async fn upsert(&self, job: &Job) -> Result<(), RepositoryError>;

    /// Record a job's current state, attempts, last error and update time.
    ///
    /// Returns `NotFound` if the job was never upserted.
    async fn update_state(&self, job: &Job) -> Result<(), RepositoryError>;

    /// Load every job in queue order.
    async fn load_all(&self) -> Result<Vec<Job>, RepositoryError>;

    /// Delete a job.
    async fn remove(&self, id: &JobId) -> Result<(), RepositoryError>;

    /// Delete every `Succeeded`/`Failed` job, returning how many went.
    async fn clear_terminal(&self) -> Result<u64, RepositoryError>;

    /// Delete terminal jobs last updated more than `older_than_days` ago.
    async fn prune_terminal(&self, older_than_days: u32) -> Result<u64, RepositoryError>;
}
