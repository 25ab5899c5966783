//! Relay dispatcher.
//!
//! The dispatcher owns the job queue and a single long-lived runner task.
//! The runner claims jobs in FIFO order, up to `max_concurrent` at a time,
//! and hands each to its own task that drives the acquisition chain and
//! then the relay transport.
//!
//! # Concurrency Model
//!
//! - `active` maps running jobs to their lease and cancellation token
//! - Lock order: always acquire `active` before the queue's internal lock
//! - Claiming (Queued -> Acquiring plus the `active` insert) and settling
//!   (lease check plus the terminal transition) each happen under the
//!   `active` lock, so `cancel` never sees a job that is active in the
//!   queue but absent from `active`
//! - A lease id guards finalize against stale commits
//! - Only the process holding the runner calls `restore`; other processes
//!   `load`. An idle runner re-reads storage every `storage_poll`

mod bridge;
mod worker;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, Semaphore, watch};
use tokio_util::sync::CancellationToken;

use pkgrelay_core::{
    AcquisitionResult, AssetRequest, CancelOutcome, DispatcherConfig, EnqueueOutcome,
    FailureReason, Job, JobHandle, JobId, JobRepositoryPort, JobState, QueueSnapshot,
    RelayDispatcherPort, RelayError, RelayEvent, RelayEventEmitterPort, RelayReceipt,
    RelayTransportPort, TransferProgress,
};

use crate::acquisition::AcquisitionChain;
use crate::queue::{JobQueue, RestoreSummary};

/// Lease ID for tracking active jobs.
///
/// Used to prevent stale finalize commits when a job is cancelled or
/// replaced while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LeaseId(u64);

/// State for a running job.
struct ActiveJob {
    lease: LeaseId,
    cancel: CancellationToken,
}

/// A job claimed by the runner.
struct Claim {
    lease: LeaseId,
    job: Job,
    cancel: CancellationToken,
}

/// Dependencies for creating a relay dispatcher.
pub struct RelayDispatcherDeps {
    /// Port for persisting the queue.
    pub repository: Arc<dyn JobRepositoryPort>,
    /// Acquisition strategies in priority order.
    pub chain: AcquisitionChain,
    /// Port for uploading to the relay endpoint.
    pub transport: Arc<dyn RelayTransportPort>,
    /// Port for emitting relay events.
    pub events: Arc<dyn RelayEventEmitterPort>,
    /// Limits and intervals.
    pub config: DispatcherConfig,
}

/// Build a relay dispatcher from its dependencies.
pub fn build_relay_dispatcher(deps: RelayDispatcherDeps) -> Arc<RelayDispatcher> {
    Arc::new(RelayDispatcher::new(deps))
}

/// Drives queued jobs through acquisition and relay.
pub struct RelayDispatcher {
    queue: JobQueue,
    chain: AcquisitionChain,
    transport: Arc<dyn RelayTransportPort>,
    events: Arc<dyn RelayEventEmitterPort>,
    config: DispatcherConfig,
    active: Mutex<HashMap<JobId, ActiveJob>>,
    lease_counter: AtomicU64,
    permits: Arc<Semaphore>,
    /// Wakes the runner when work may be available.
    queue_notify: Notify,
    /// Wakes `run_until_idle` and `shutdown` waiters after any job settles.
    idle_notify: Notify,
    runner_started: AtomicBool,
    stopping: CancellationToken,
}

impl RelayDispatcher {
    fn new(deps: RelayDispatcherDeps) -> Self {
        Self {
            queue: JobQueue::new(deps.repository, deps.config.max_queue_size),
            chain: deps.chain,
            transport: deps.transport,
            events: deps.events,
            permits: Arc::new(Semaphore::new(deps.config.max_concurrent.max(1))),
            config: deps.config,
            active: Mutex::new(HashMap::new()),
            lease_counter: AtomicU64::new(0),
            queue_notify: Notify::new(),
            idle_notify: Notify::new(),
            runner_started: AtomicBool::new(false),
            stopping: CancellationToken::new(),
        }
    }

    /// Current configuration.
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Reload the queue from storage.
    ///
    /// Call once before `ensure_runner`. Jobs that were running when the
    /// process stopped are reported as `Failed(Interrupted)`.
    pub async fn restore(&self) -> Result<RestoreSummary, RelayError> {
        let summary = self.queue.restore().await?;
        for id in &summary.interrupted {
            tracing::warn!(target: "pkgrelay.dispatch", job_id = %id, "Job was interrupted by shutdown");
            self.events
                .emit(RelayEvent::failed(*id, FailureReason::Interrupted));
        }
        if summary.resumed > 0 {
            self.queue_notify.notify_one();
        }
        Ok(summary)
    }

    /// Load the queue from storage without changing any job.
    ///
    /// For processes that inspect or edit the queue while a runner may be
    /// working in another process. Returns the number of jobs loaded.
    pub async fn load(&self) -> Result<usize, RelayError> {
        let loaded = self.queue.load().await?;
        tracing::debug!(target: "pkgrelay.queue", loaded, "Loaded relay queue");
        Ok(loaded)
    }

    /// Fold in jobs other processes queued or removed.
    async fn sync_from_storage(&self) {
        let outcome = match self.queue.sync_from_storage().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(target: "pkgrelay.queue", error = %e, "Could not re-read queue from storage");
                return;
            }
        };
        if outcome.is_empty() {
            return;
        }
        for job in &outcome.adopted {
            tracing::info!(target: "pkgrelay.queue", job_id = %job.id, request = %job.request, "Picked up job queued elsewhere");
            self.events.emit(RelayEvent::JobQueued {
                id: job.id,
                destination: job.request.destination_path(),
            });
        }
        for id in &outcome.dropped {
            tracing::info!(target: "pkgrelay.queue", job_id = %id, "Job was removed elsewhere");
            self.events.emit(RelayEvent::JobRemoved { id: *id });
        }
        self.idle_notify.notify_waiters();
    }

    /// Ensure the runner is started.
    ///
    /// This method is idempotent: calling it multiple times has no effect
    /// after the first call. The runner lives until `shutdown`.
    pub fn ensure_runner(self: &Arc<Self>) {
        if self
            .runner_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                dispatcher.run_loop().await;
            });
            tracing::debug!(target: "pkgrelay.dispatch", max_concurrent = self.config.max_concurrent, "Runner started");
        }
    }

    /// Start the runner if needed and wait until nothing is pending or
    /// active.
    pub async fn run_until_idle(self: &Arc<Self>) {
        self.ensure_runner();
        loop {
            let idle = self.idle_notify.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.is_idle().await {
                return;
            }
            idle.await;
        }
    }

    /// Stop claiming jobs, cancel every running job and wait for them to
    /// settle. Queued jobs stay queued for the next start.
    ///
    /// Returns the number of jobs cancelled.
    pub async fn shutdown(&self) -> usize {
        self.stopping.cancel();
        let cancelled = self.cancel_active().await;
        loop {
            let idle = self.idle_notify.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.active.lock().await.is_empty() {
                break;
            }
            idle.await;
        }
        tracing::info!(target: "pkgrelay.dispatch", cancelled, "Dispatcher shut down");
        cancelled
    }

    /// Synchronous best-effort cancellation for process termination.
    pub fn shutdown_cleanup(&self) -> usize {
        self.stopping.cancel();
        // We can't block on tokio::sync::Mutex here, so use try_lock
        self.active.try_lock().map_or_else(
            |_| {
                tracing::warn!(target: "pkgrelay.dispatch", "Shutdown cleanup: couldn't acquire lock");
                0
            },
            |active| {
                for job in active.values() {
                    job.cancel.cancel();
                }
                active.len()
            },
        )
    }

    /// Drop terminal jobs older than `older_than_days`.
    pub async fn prune_terminal(&self, older_than_days: u32) -> Result<usize, RelayError> {
        let pruned = self.queue.prune_terminal(older_than_days).await?;
        tracing::info!(target: "pkgrelay.queue", pruned, older_than_days, "Pruned terminal jobs");
        Ok(pruned)
    }

    async fn is_idle(&self) -> bool {
        let active = self.active.lock().await;
        active.is_empty() && !self.queue.has_pending().await
    }

    async fn cancel_active(&self) -> usize {
        let active = self.active.lock().await;
        for (id, job) in active.iter() {
            job.cancel.cancel();
            tracing::info!(target: "pkgrelay.dispatch", job_id = %id, "Cancelling active job");
        }
        active.len()
    }

    /// The main runner loop.
    ///
    /// Waits for a permit, claims the oldest queued job and spawns its
    /// task; sleeps on `queue_notify` when nothing is queued.
    async fn run_loop(self: Arc<Self>) {
        loop {
            let permit = tokio::select! {
                biased;

                () = self.stopping.cancelled() => break,

                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if let Some(claim) = self.next_job().await {
                let dispatcher = Arc::clone(&self);
                tokio::spawn(async move {
                    dispatcher.execute(claim).await;
                    drop(permit);
                    // Keep draining
                    dispatcher.queue_notify.notify_one();
                });
            } else {
                drop(permit);
                self.idle_notify.notify_waiters();
                tokio::select! {
                    biased;

                    () = self.stopping.cancelled() => break,

                    () = self.queue_notify.notified() => {}

                    () = storage_tick(self.config.storage_poll) => self.sync_from_storage().await,
                }
            }
        }
        tracing::debug!(target: "pkgrelay.dispatch", "Runner stopped");
    }

    /// Claim the next job.
    ///
    /// Returns `None` if nothing is queued or the dispatcher is stopping.
    /// Lock order: active → queue.
    async fn next_job(&self) -> Option<Claim> {
        if self.stopping.is_cancelled() {
            return None;
        }

        let mut active = self.active.lock().await;
        let job = self.queue.dequeue_next().await?;

        let lease = LeaseId(self.lease_counter.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        active.insert(
            job.id,
            ActiveJob {
                lease,
                cancel: cancel.clone(),
            },
        );

        Some(Claim { lease, job, cancel })
    }

    /// Run one claimed job to a terminal state.
    async fn execute(&self, claim: Claim) {
        let Claim { lease, job, cancel } = claim;
        tracing::info!(
            target: "pkgrelay.dispatch",
            job_id = %job.id,
            request = %job.request,
            attempt = job.attempts,
            "Job started"
        );
        self.events
            .emit(RelayEvent::state_changed(job.id, JobState::Acquiring));

        let outcome = self.drive(&job, &cancel).await;
        self.finalize_job(&job.id, lease, outcome).await;
    }

    /// Acquire, move to `Relaying`, relay.
    async fn drive(&self, job: &Job, cancel: &CancellationToken) -> Result<RelayReceipt, FailureReason> {
        let acquired = worker::acquire(&self.chain, &job.request, cancel).await?;

        if let AcquisitionResult::LocalStream {
            installed_version, ..
        } = &acquired.result
        {
            if installed_version != &job.request.version {
                self.events.emit(RelayEvent::VersionMismatch {
                    id: job.id,
                    requested: job.request.version.clone(),
                    installed: installed_version.clone(),
                });
            }
        }

        if let Err(e) = self.queue.mark_state(&job.id, JobState::Relaying, None).await {
            tracing::error!(target: "pkgrelay.dispatch", job_id = %job.id, error = %e, "Could not enter relaying state");
            return Err(FailureReason::transport(None, e.to_string()));
        }
        self.events
            .emit(RelayEvent::state_changed(job.id, JobState::Relaying));

        let destination = job.request.destination_path();
        tracing::info!(
            target: "pkgrelay.dispatch",
            job_id = %job.id,
            strategy = acquired.strategy,
            destination = %destination,
            "Relaying"
        );

        let (progress_tx, progress_rx) = watch::channel(TransferProgress::default());
        let finished = CancellationToken::new();
        let bridge = bridge::spawn_progress_bridge(
            Arc::clone(&self.events),
            job.id,
            progress_rx,
            self.config.progress_interval,
            cancel.clone(),
            finished.clone(),
        );

        let result = worker::relay(
            self.transport.as_ref(),
            &destination,
            acquired,
            progress_tx,
            cancel,
        )
        .await;

        finished.cancel();
        if let Err(e) = bridge.await {
            tracing::debug!(target: "pkgrelay.dispatch", job_id = %job.id, error = %e, "Progress bridge ended abnormally");
        }
        result
    }

    /// Finalize a job after it completes or fails.
    ///
    /// Verifies the lease to prevent stale commits.
    /// Lock order: active → queue.
    async fn finalize_job(
        &self,
        id: &JobId,
        lease: LeaseId,
        outcome: Result<RelayReceipt, FailureReason>,
    ) {
        let mut active = self.active.lock().await;
        if !Self::verify_and_remove_lease(&mut active, id, lease) {
            tracing::debug!(target: "pkgrelay.dispatch", job_id = %id, "Ignoring stale finalize (lease mismatch)");
            return;
        }

        let (state, error) = match &outcome {
            Ok(_) => (JobState::Succeeded, None),
            Err(reason) => (JobState::Failed, Some(reason.clone())),
        };

        match self.queue.mark_state(id, state, error).await {
            Ok(job) => {
                match &outcome {
                    Ok(receipt) => tracing::info!(
                        target: "pkgrelay.dispatch",
                        job_id = %id,
                        destination = %receipt.destination,
                        bytes = receipt.bytes_sent,
                        status = receipt.status,
                        "Job succeeded"
                    ),
                    Err(reason) if reason.is_cancelled() => {
                        tracing::info!(target: "pkgrelay.dispatch", job_id = %id, "Job cancelled");
                    }
                    Err(reason) => {
                        tracing::warn!(target: "pkgrelay.dispatch", job_id = %id, reason = %reason, "Job failed");
                    }
                }
                self.events.emit(RelayEvent::JobStateChanged {
                    id: job.id,
                    state: job.state,
                    error: job.last_error,
                });
            }
            Err(e) => {
                tracing::error!(target: "pkgrelay.dispatch", job_id = %id, error = %e, "Failed to settle job");
            }
        }

        drop(active);
        self.idle_notify.notify_waiters();
    }

    /// Verify lease matches and remove from active map.
    fn verify_and_remove_lease(
        active: &mut HashMap<JobId, ActiveJob>,
        id: &JobId,
        lease: LeaseId,
    ) -> bool {
        active
            .get(id)
            .is_some_and(|job| job.lease == lease)
            .then(|| active.remove(id))
            .is_some()
    }
}

/// Resolves after `interval`, or never.
async fn storage_tick(interval: Option<Duration>) {
    match interval {
        Some(interval) => tokio::time::sleep(interval).await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl RelayDispatcherPort for RelayDispatcher {
    async fn enqueue(&self, request: AssetRequest) -> Result<JobHandle, RelayError> {
        let destination = request.destination_path();
        let handle = self.queue.enqueue(request).await?;

        if handle.outcome == EnqueueOutcome::Existing {
            tracing::debug!(target: "pkgrelay.queue", job_id = %handle.id, state = %handle.state, "Request already queued");
        } else {
            tracing::info!(target: "pkgrelay.queue", job_id = %handle.id, destination = %destination, outcome = ?handle.outcome, "Job queued");
            self.events.emit(RelayEvent::JobQueued {
                id: handle.id,
                destination,
            });
            self.queue_notify.notify_one();
        }
        Ok(handle)
    }

    async fn get_job(&self, id: &JobId) -> Result<Job, RelayError> {
        self.queue.get(id).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RelayError> {
        Ok(self.queue.list().await)
    }

    async fn snapshot(&self) -> Result<QueueSnapshot, RelayError> {
        Ok(self.queue.snapshot().await)
    }

    async fn cancel(&self, id: &JobId) -> Result<CancelOutcome, RelayError> {
        // Lock order: active → queue
        let active = self.active.lock().await;
        if let Some(job) = active.get(id) {
            job.cancel.cancel();
            tracing::info!(target: "pkgrelay.dispatch", job_id = %id, "Cancelled active job");
            return Ok(CancelOutcome::Cancelling);
        }

        self.queue.remove_queued(id).await?;
        drop(active);

        tracing::info!(target: "pkgrelay.queue", job_id = %id, "Removed job from queue");
        self.events.emit(RelayEvent::JobRemoved { id: *id });
        self.idle_notify.notify_waiters();
        Ok(CancelOutcome::Removed)
    }

    async fn cancel_all(&self) -> Result<usize, RelayError> {
        let active = self.active.lock().await;
        for job in active.values() {
            job.cancel.cancel();
        }
        let cancelled = active.len();
        let removed = self.queue.remove_all_queued().await?;
        drop(active);

        for id in &removed {
            self.events.emit(RelayEvent::JobRemoved { id: *id });
        }
        self.idle_notify.notify_waiters();
        tracing::info!(target: "pkgrelay.dispatch", cancelled, removed = removed.len(), "Cancelled all jobs");
        Ok(cancelled + removed.len())
    }

    async fn clear(&self, id: &JobId) -> Result<(), RelayError> {
        self.queue.clear(id).await?;
        tracing::debug!(target: "pkgrelay.queue", job_id = %id, "Cleared job");
        Ok(())
    }

    async fn clear_terminal(&self) -> Result<usize, RelayError> {
        let cleared = self.queue.clear_terminal().await?;
        tracing::info!(target: "pkgrelay.queue", cleared, "Cleared terminal jobs");
        Ok(cleared)
    }
}
