//! Relay queue management.
//!
//! [`RelayQueue`] is a pure state machine over the jobs known to this
//! process. [`JobQueue`] wraps it with write-through persistence.
//!
//! # Design
//!
//! - Pure synchronous state machine (no async, no IO, no tracing)
//! - Mutations are split into `plan_*` (compute the next job record) and
//!   `commit`/`insert` (apply it), so the caller can persist in between
//! - Queue order is insertion order; FIFO holds among `Queued` jobs only

mod durable;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use pkgrelay_core::{
    AssetRequest, EnqueueOutcome, FailureReason, Job, JobHandle, JobId, JobState, QueueSnapshot,
    RelayError,
};

pub use durable::{JobQueue, RestoreSummary};

/// What `plan_enqueue` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueuePlan {
    /// An equal request is pending or active; nothing to write.
    Existing(JobHandle),
    /// Write this record, then `insert` it.
    Insert {
        /// New or reset job record.
        job: Job,
        /// `Created` or `Requeued`.
        outcome: EnqueueOutcome,
    },
}

/// What `merge_stored` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Queued jobs written by another process, now at the back.
    pub adopted: Vec<Job>,
    /// Queued jobs removed from storage by another process.
    pub dropped: Vec<JobId>,
}

impl MergeOutcome {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.dropped.is_empty()
    }
}

/// Manages relay jobs in queue order.
///
/// This is a sync type with no internal locking; [`JobQueue`] is
/// responsible for synchronization.
#[derive(Debug)]
pub struct RelayQueue {
    jobs: IndexMap<JobId, Job>,
    max_size: u32,
}

impl RelayQueue {
    /// Create an empty queue holding at most `max_size` non-terminal jobs.
    pub fn new(max_size: u32) -> Self {
        Self {
            jobs: IndexMap::new(),
            max_size,
        }
    }

    /// Get the maximum queue size.
    pub const fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Replace the contents with jobs loaded from storage, in order.
    pub fn restore(&mut self, jobs: impl IntoIterator<Item = Job>) {
        self.jobs = jobs.into_iter().map(|job| (job.id, job)).collect();
    }

    /// Fold queue changes made by other processes into this queue.
    ///
    /// `stored` is the repository contents in order. A stored `Queued` job
    /// that is unknown here, or terminal here, is appended. A local
    /// `Queued` job missing from storage is dropped. Jobs this process is
    /// running are never touched.
    pub fn merge_stored(&mut self, stored: Vec<Job>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        let stored_ids: HashSet<JobId> = stored.iter().map(|job| job.id).collect();
        for id in self.queued_ids() {
            if !stored_ids.contains(&id) {
                self.jobs.shift_remove(&id);
                outcome.dropped.push(id);
            }
        }

        for job in stored {
            if job.state != JobState::Queued {
                continue;
            }
            let adopt = self
                .jobs
                .get(&job.id)
                .is_none_or(|local| local.state.is_terminal());
            if adopt {
                outcome.adopted.push(job.clone());
                self.insert(job);
            }
        }
        outcome
    }

    /// Look up a job.
    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Every job in queue order.
    pub fn list(&self) -> Vec<Job> {
        self.jobs.values().cloned().collect()
    }

    /// Number of `Queued` jobs.
    pub fn pending_len(&self) -> usize {
        self.count(|state| state == JobState::Queued)
    }

    /// Number of `Acquiring`/`Relaying` jobs.
    pub fn active_len(&self) -> usize {
        self.count(|state| state.is_active())
    }

    /// Whether any job is waiting.
    pub fn has_pending(&self) -> bool {
        self.jobs.values().any(|job| job.state == JobState::Queued)
    }

    /// Snapshot of the whole queue.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            jobs: self.list(),
            pending: self.pending_len(),
            active: self.active_len(),
            max_size: self.max_size,
        }
    }

    /// Find the job for an equal request tuple.
    pub fn find(&self, request: &AssetRequest) -> Option<&Job> {
        self.jobs.values().find(|job| &job.request == request)
    }

    /// Decide how to enqueue `request`.
    ///
    /// Pending or active duplicates resolve to `Existing`. A terminal
    /// duplicate is reset under its old id and counts against capacity like
    /// a new job.
    pub fn plan_enqueue(
        &self,
        request: AssetRequest,
        now: DateTime<Utc>,
    ) -> Result<EnqueuePlan, RelayError> {
        request.validate().map_err(RelayError::invalid_request)?;

        let existing = self.find(&request);
        if let Some(job) = existing.filter(|job| !job.state.is_terminal()) {
            return Ok(EnqueuePlan::Existing(JobHandle {
                id: job.id,
                state: job.state,
                outcome: EnqueueOutcome::Existing,
            }));
        }

        self.check_capacity()?;

        Ok(match existing {
            Some(job) => EnqueuePlan::Insert {
                job: job.clone().requeued(now),
                outcome: EnqueueOutcome::Requeued,
            },
            None => EnqueuePlan::Insert {
                job: Job::new(request, now),
                outcome: EnqueueOutcome::Created,
            },
        })
    }

    /// Apply an enqueue plan's record, moving it to the back of the queue.
    pub fn insert(&mut self, job: Job) {
        self.jobs.shift_remove(&job.id);
        self.jobs.insert(job.id, job);
    }

    /// The oldest `Queued` job.
    pub fn next_queued_id(&self) -> Option<JobId> {
        self.jobs
            .values()
            .find(|job| job.state == JobState::Queued)
            .map(|job| job.id)
    }

    /// Compute the record for moving job `id` to state `to`.
    ///
    /// Entering `Acquiring` counts an attempt. `error` is kept only for
    /// `Failed`.
    pub fn plan_transition(
        &self,
        id: &JobId,
        to: JobState,
        error: Option<FailureReason>,
        now: DateTime<Utc>,
    ) -> Result<Job, RelayError> {
        let current = self.jobs.get(id).ok_or_else(|| RelayError::not_found(id))?;
        if !current.state.can_transition_to(to) {
            return Err(RelayError::illegal_transition(id, current.state, to));
        }

        let mut next = current.clone();
        if to == JobState::Acquiring {
            next.attempts = next.attempts.saturating_add(1);
        }
        next.state = to;
        next.last_error = if to == JobState::Failed { error } else { None };
        next.updated_at = now;
        Ok(next)
    }

    /// Apply a planned transition in place (queue order is unchanged).
    pub fn commit(&mut self, job: Job) {
        if let Some(slot) = self.jobs.get_mut(&job.id) {
            *slot = job;
        }
    }

    /// Check that job `id` is still `Queued` and may be removed.
    pub fn check_removable(&self, id: &JobId) -> Result<(), RelayError> {
        let job = self.jobs.get(id).ok_or_else(|| RelayError::not_found(id))?;
        match job.state {
            JobState::Queued => Ok(()),
            state if state.is_terminal() => Err(RelayError::already_terminal(id, state)),
            state => Err(RelayError::not_terminal(id, state)),
        }
    }

    /// Check that job `id` is terminal and may be cleared.
    pub fn check_clearable(&self, id: &JobId) -> Result<(), RelayError> {
        let job = self.jobs.get(id).ok_or_else(|| RelayError::not_found(id))?;
        if job.state.is_terminal() {
            Ok(())
        } else {
            Err(RelayError::not_terminal(id, job.state))
        }
    }

    /// Remove a job regardless of state.
    pub fn remove(&mut self, id: &JobId) -> Option<Job> {
        self.jobs.shift_remove(id)
    }

    /// Ids of every `Queued` job, oldest first.
    pub fn queued_ids(&self) -> Vec<JobId> {
        self.jobs
            .values()
            .filter(|job| job.state == JobState::Queued)
            .map(|job| job.id)
            .collect()
    }

    /// Drop every terminal job, returning how many went.
    pub fn clear_terminal(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.state.is_terminal());
        before - self.jobs.len()
    }

    /// Drop terminal jobs last updated before `cutoff`.
    pub fn prune_terminal(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !(job.state.is_terminal() && job.updated_at < cutoff));
        before - self.jobs.len()
    }

    fn check_capacity(&self) -> Result<(), RelayError> {
        let live = self.count(|state| !state.is_terminal());
        if live >= self.max_size as usize {
            return Err(RelayError::queue_full(self.max_size));
        }
        Ok(())
    }

    fn count(&self, pred: impl Fn(JobState) -> bool) -> usize {
        self.jobs.values().filter(|job| pred(job.state)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(asset: &str) -> AssetRequest {
        AssetRequest::with_defaults(asset, "42")
    }

    fn enqueue(queue: &mut RelayQueue, asset: &str) -> JobHandle {
        match queue.plan_enqueue(request(asset), Utc::now()).unwrap() {
            EnqueuePlan::Existing(handle) => handle,
            EnqueuePlan::Insert { job, outcome } => {
                let handle = JobHandle {
                    id: job.id,
                    state: job.state,
                    outcome,
                };
                queue.insert(job);
                handle
            }
        }
    }

    fn advance(queue: &mut RelayQueue, id: &JobId, to: JobState, error: Option<FailureReason>) {
        let job = queue.plan_transition(id, to, error, Utc::now()).unwrap();
        queue.commit(job);
    }

    #[test]
    fn duplicate_pending_request_returns_existing_handle() {
        let mut queue = RelayQueue::new(10);
        let first = enqueue(&mut queue, "com.example.app");
        let second = enqueue(&mut queue, "com.example.app");

        assert_eq!(first.outcome, EnqueueOutcome::Created);
        assert_eq!(second.outcome, EnqueueOutcome::Existing);
        assert_eq!(first.id, second.id);
        assert_eq!(queue.list().len(), 1);
    }

    #[test]
    fn duplicate_active_request_returns_existing_handle() {
        let mut queue = RelayQueue::new(10);
        let first = enqueue(&mut queue, "com.example.app");
        advance(&mut queue, &first.id, JobState::Acquiring, None);

        let second = enqueue(&mut queue, "com.example.app");
        assert_eq!(second.outcome, EnqueueOutcome::Existing);
        assert_eq!(second.state, JobState::Acquiring);
    }

    #[test]
    fn terminal_request_is_requeued_at_the_back_with_same_id() {
        let mut queue = RelayQueue::new(10);
        let a = enqueue(&mut queue, "com.example.a");
        enqueue(&mut queue, "com.example.b");
        advance(&mut queue, &a.id, JobState::Acquiring, None);
        advance(&mut queue, &a.id, JobState::Failed, Some(FailureReason::Cancelled));

        let again = enqueue(&mut queue, "com.example.a");
        assert_eq!(again.outcome, EnqueueOutcome::Requeued);
        assert_eq!(again.id, a.id);

        let jobs = queue.list();
        assert_eq!(jobs.last().unwrap().id, a.id);
        assert_eq!(jobs.last().unwrap().attempts, 0);
        assert!(jobs.last().unwrap().last_error.is_none());
    }

    #[test]
    fn capacity_counts_only_live_jobs() {
        let mut queue = RelayQueue::new(2);
        let a = enqueue(&mut queue, "com.example.a");
        enqueue(&mut queue, "com.example.b");

        let err = queue
            .plan_enqueue(request("com.example.c"), Utc::now())
            .unwrap_err();
        assert_eq!(err, RelayError::queue_full(2));

        advance(&mut queue, &a.id, JobState::Failed, Some(FailureReason::Cancelled));
        assert!(queue.plan_enqueue(request("com.example.c"), Utc::now()).is_ok());
    }

    #[test]
    fn invalid_request_is_rejected() {
        let queue = RelayQueue::new(2);
        let err = queue
            .plan_enqueue(AssetRequest::with_defaults("", "42"), Utc::now())
            .unwrap_err();
        assert_eq!(err, RelayError::invalid_request("asset_id"));

        let err = queue
            .plan_enqueue(
                AssetRequest::new("com.example.app", "42", "arm64-v8a", "."),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, RelayError::invalid_request("channel"));
        assert!(queue.list().is_empty());
    }

    #[test]
    fn next_queued_is_fifo_and_skips_active() {
        let mut queue = RelayQueue::new(10);
        let a = enqueue(&mut queue, "com.example.a");
        let b = enqueue(&mut queue, "com.example.b");

        assert_eq!(queue.next_queued_id(), Some(a.id));
        advance(&mut queue, &a.id, JobState::Acquiring, None);
        assert_eq!(queue.next_queued_id(), Some(b.id));
    }

    #[test]
    fn acquiring_counts_an_attempt() {
        let mut queue = RelayQueue::new(10);
        let a = enqueue(&mut queue, "com.example.a");
        let job = queue
            .plan_transition(&a.id, JobState::Acquiring, None, Utc::now())
            .unwrap();
        assert_eq!(job.attempts, 1);
    }

    #[test]
    fn illegal_transition_is_rejected_without_change() {
        let mut queue = RelayQueue::new(10);
        let a = enqueue(&mut queue, "com.example.a");

        let err = queue
            .plan_transition(&a.id, JobState::Succeeded, None, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            RelayError::illegal_transition(a.id, JobState::Queued, JobState::Succeeded)
        );
        assert_eq!(queue.get(&a.id).unwrap().state, JobState::Queued);
    }

    #[test]
    fn error_is_kept_only_for_failed() {
        let mut queue = RelayQueue::new(10);
        let a = enqueue(&mut queue, "com.example.a");
        let job = queue
            .plan_transition(
                &a.id,
                JobState::Acquiring,
                Some(FailureReason::Cancelled),
                Utc::now(),
            )
            .unwrap();
        assert!(job.last_error.is_none());
    }

    #[test]
    fn removal_and_clear_guards() {
        let mut queue = RelayQueue::new(10);
        let a = enqueue(&mut queue, "com.example.a");
        let b = enqueue(&mut queue, "com.example.b");

        assert!(queue.check_removable(&a.id).is_ok());
        assert!(matches!(
            queue.check_clearable(&a.id),
            Err(RelayError::JobNotTerminal { .. })
        ));

        advance(&mut queue, &b.id, JobState::Acquiring, None);
        assert!(matches!(
            queue.check_removable(&b.id),
            Err(RelayError::JobNotTerminal { .. })
        ));

        advance(&mut queue, &b.id, JobState::Failed, Some(FailureReason::Cancelled));
        assert!(matches!(
            queue.check_removable(&b.id),
            Err(RelayError::AlreadyTerminal { .. })
        ));
        assert!(queue.check_clearable(&b.id).is_ok());
        assert_eq!(queue.clear_terminal(), 1);
        assert_eq!(queue.list().len(), 1);
    }

    #[test]
    fn prune_keeps_recent_terminal_jobs() {
        let mut queue = RelayQueue::new(10);
        let a = enqueue(&mut queue, "com.example.a");
        advance(&mut queue, &a.id, JobState::Failed, Some(FailureReason::Cancelled));

        let past = Utc::now() - chrono::Duration::days(1);
        assert_eq!(queue.prune_terminal(past), 0);
        let future = Utc::now() + chrono::Duration::days(1);
        assert_eq!(queue.prune_terminal(future), 1);
    }

    #[test]
    fn merge_adopts_foreign_jobs_and_drops_removed_ones() {
        let mut queue = RelayQueue::new(10);
        let kept = enqueue(&mut queue, "com.example.kept");
        let gone = enqueue(&mut queue, "com.example.gone");
        let running = enqueue(&mut queue, "com.example.running");
        advance(&mut queue, &running.id, JobState::Acquiring, None);

        let mut stored: Vec<Job> = queue
            .list()
            .into_iter()
            .filter(|job| job.id != gone.id)
            .collect();
        let foreign = Job::new(request("com.example.foreign"), Utc::now());
        stored.push(foreign.clone());
        // Another process thinks the running job is still queued
        stored
            .iter_mut()
            .filter(|job| job.id == running.id)
            .for_each(|job| job.state = JobState::Queued);

        let outcome = queue.merge_stored(stored);

        assert_eq!(outcome.adopted, vec![foreign.clone()]);
        assert_eq!(outcome.dropped, vec![gone.id]);
        assert_eq!(queue.get(&running.id).unwrap().state, JobState::Acquiring);
        let ids: Vec<JobId> = queue.list().iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![kept.id, running.id, foreign.id]);
    }

    #[test]
    fn merge_requeues_a_job_finished_here() {
        let mut queue = RelayQueue::new(10);
        let a = enqueue(&mut queue, "com.example.a");
        advance(&mut queue, &a.id, JobState::Failed, Some(FailureReason::Cancelled));

        let requeued = queue.get(&a.id).unwrap().clone().requeued(Utc::now());
        let outcome = queue.merge_stored(vec![requeued]);

        assert_eq!(outcome.adopted.len(), 1);
        assert_eq!(queue.get(&a.id).unwrap().state, JobState::Queued);
        assert!(queue.merge_stored(queue.list()).is_empty());
    }

    #[test]
    fn snapshot_counts_states() {
        let mut queue = RelayQueue::new(7);
        let a = enqueue(&mut queue, "com.example.a");
        enqueue(&mut queue, "com.example.b");
        advance(&mut queue, &a.id, JobState::Acquiring, None);

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.pending, 1);
        assert_eq!(snapshot.active, 1);
        assert_eq!(snapshot.max_size, 7);
        assert_eq!(snapshot.jobs.len(), 2);
    }
}
