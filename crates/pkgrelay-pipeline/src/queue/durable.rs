//! Write-through persistence for the relay queue.
//!
//! Every mutation is planned against the in-memory queue, written to the
//! job repository, and only then applied, all under the queue's write
//! lock. Caller-initiated mutations (enqueue, remove, clear) are strict: a
//! storage failure is returned and nothing changes. Dispatcher-driven
//! transitions are applied even if the write fails. The failure is logged
//! and the next successful `update_state` writes the full record again.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use pkgrelay_core::{
    AssetRequest, FailureReason, Job, JobHandle, JobId, JobRepositoryPort, JobState,
    QueueSnapshot, RelayError,
};

use super::{EnqueuePlan, MergeOutcome, RelayQueue};

/// Result of reloading the queue from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Jobs loaded in total.
    pub loaded: usize,
    /// `Queued` jobs that will resume in their original order.
    pub resumed: usize,
    /// Jobs found `Acquiring`/`Relaying` and marked `Failed(Interrupted)`.
    pub interrupted: Vec<JobId>,
}

/// Durable FIFO of relay jobs.
pub struct JobQueue {
    state: RwLock<RelayQueue>,
    repository: Arc<dyn JobRepositoryPort>,
}

impl JobQueue {
    /// Create an empty queue backed by `repository`.
    pub fn new(repository: Arc<dyn JobRepositoryPort>, max_size: u32) -> Self {
        Self {
            state: RwLock::new(RelayQueue::new(max_size)),
            repository,
        }
    }

    /// Reload every job from storage, replacing the in-memory queue.
    ///
    /// Jobs that were active when the process stopped cannot be resumed
    /// mid-stream; they become `Failed(Interrupted)` and wait for an
    /// explicit re-enqueue.
    pub async fn restore(&self) -> Result<RestoreSummary, RelayError> {
        let mut queue = self.state.write().await;
        let now = Utc::now();
        let stored = self.repository.load_all().await?;

        let mut summary = RestoreSummary {
            loaded: stored.len(),
            ..RestoreSummary::default()
        };
        let mut jobs = Vec::with_capacity(stored.len());
        for job in stored {
            let job = if job.state.is_active() {
                let job = job.interrupted(now);
                if let Err(e) = self.repository.update_state(&job).await {
                    tracing::error!(target: "pkgrelay.queue", job_id = %job.id, error = %e, "Failed to persist interrupted job");
                }
                summary.interrupted.push(job.id);
                job
            } else {
                job
            };
            if job.state == JobState::Queued {
                summary.resumed += 1;
            }
            jobs.push(job);
        }
        queue.restore(jobs);

        tracing::info!(
            target: "pkgrelay.queue",
            loaded = summary.loaded,
            resumed = summary.resumed,
            interrupted = summary.interrupted.len(),
            "Restored relay queue"
        );
        Ok(summary)
    }

    /// Replace the in-memory queue with storage as-is.
    ///
    /// Nothing is written. Active jobs keep their state; they may belong to
    /// a runner in another process.
    pub async fn load(&self) -> Result<usize, RelayError> {
        let mut queue = self.state.write().await;
        let stored = self.repository.load_all().await?;
        let loaded = stored.len();
        queue.restore(stored);
        Ok(loaded)
    }

    /// Pick up jobs queued or removed by other processes since the last
    /// load. Nothing is written.
    pub async fn sync_from_storage(&self) -> Result<MergeOutcome, RelayError> {
        let mut queue = self.state.write().await;
        let stored = self.repository.load_all().await?;
        Ok(queue.merge_stored(stored))
    }

    /// Queue a request; idempotent for pending or active duplicates.
    pub async fn enqueue(&self, request: AssetRequest) -> Result<JobHandle, RelayError> {
        let mut queue = self.state.write().await;
        match queue.plan_enqueue(request, Utc::now())? {
            EnqueuePlan::Existing(handle) => Ok(handle),
            EnqueuePlan::Insert { job, outcome } => {
                self.repository.upsert(&job).await?;
                let handle = JobHandle {
                    id: job.id,
                    state: job.state,
                    outcome,
                };
                tracing::debug!(target: "pkgrelay.queue", job_id = %job.id, request = %job.request, ?outcome, "Job enqueued");
                queue.insert(job);
                Ok(handle)
            }
        }
    }

    /// Claim the oldest `Queued` job, moving it to `Acquiring`.
    pub async fn dequeue_next(&self) -> Option<Job> {
        let mut queue = self.state.write().await;
        let id = queue.next_queued_id()?;
        match queue.plan_transition(&id, JobState::Acquiring, None, Utc::now()) {
            Ok(job) => {
                self.write_through(&job).await;
                queue.commit(job.clone());
                Some(job)
            }
            Err(e) => {
                tracing::error!(target: "pkgrelay.queue", job_id = %id, error = %e, "Queued job could not be claimed");
                None
            }
        }
    }

    /// Validate and apply a state transition.
    ///
    /// Illegal transitions are rejected with no change.
    pub async fn mark_state(
        &self,
        id: &JobId,
        state: JobState,
        error: Option<FailureReason>,
    ) -> Result<Job, RelayError> {
        let mut queue = self.state.write().await;
        let job = queue.plan_transition(id, state, error, Utc::now())?;
        self.write_through(&job).await;
        queue.commit(job.clone());
        Ok(job)
    }

    /// Remove a job that is still `Queued`.
    pub async fn remove_queued(&self, id: &JobId) -> Result<Job, RelayError> {
        let mut queue = self.state.write().await;
        queue.check_removable(id)?;
        self.repository.remove(id).await?;
        queue.remove(id).ok_or_else(|| RelayError::not_found(id))
    }

    /// Remove every `Queued` job, returning their ids.
    ///
    /// Stops at the first storage failure; jobs removed before it stay
    /// removed.
    pub async fn remove_all_queued(&self) -> Result<Vec<JobId>, RelayError> {
        let mut queue = self.state.write().await;
        let mut removed = Vec::new();
        for id in queue.queued_ids() {
            self.repository.remove(&id).await?;
            queue.remove(&id);
            removed.push(id);
        }
        Ok(removed)
    }

    /// Drop one terminal job.
    pub async fn clear(&self, id: &JobId) -> Result<(), RelayError> {
        let mut queue = self.state.write().await;
        queue.check_clearable(id)?;
        self.repository.remove(id).await?;
        queue.remove(id);
        Ok(())
    }

    /// Drop every terminal job.
    pub async fn clear_terminal(&self) -> Result<usize, RelayError> {
        let mut queue = self.state.write().await;
        self.repository.clear_terminal().await?;
        Ok(queue.clear_terminal())
    }

    /// Drop terminal jobs older than `older_than_days`.
    pub async fn prune_terminal(&self, older_than_days: u32) -> Result<usize, RelayError> {
        let mut queue = self.state.write().await;
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));
        self.repository.prune_terminal(older_than_days).await?;
        Ok(queue.prune_terminal(cutoff))
    }

    /// Look up one job.
    pub async fn get(&self, id: &JobId) -> Result<Job, RelayError> {
        self.state
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RelayError::not_found(id))
    }

    /// Every job in queue order.
    pub async fn list(&self) -> Vec<Job> {
        self.state.read().await.list()
    }

    /// Snapshot of the whole queue.
    pub async fn snapshot(&self) -> QueueSnapshot {
        self.state.read().await.snapshot()
    }

    /// Whether any job is waiting.
    pub async fn has_pending(&self) -> bool {
        self.state.read().await.has_pending()
    }

    async fn write_through(&self, job: &Job) {
        if let Err(e) = self.repository.update_state(job).await {
            tracing::error!(
                target: "pkgrelay.queue",
                job_id = %job.id,
                state = %job.state,
                error = %e,
                "Failed to persist job state; continuing in memory"
            );
        }
    }
}
