//! Job types, failure detail, errors and events.

mod errors;
mod events;
mod failure;
mod types;

pub use errors::RelayError;
pub use events::{RelayEvent, TransferProgress};
pub use failure::{FailureReason, StrategyAttempt, UnavailableReason};
pub use types::{AssetRequest, EnqueueOutcome, Job, JobHandle, JobId, JobState, QueueSnapshot};
