//! Relay pipeline for pkgrelay.
//!
//! | module | role |
//! |---|---|
//! | `queue` | [`RelayQueue`] state machine and the write-through [`JobQueue`] |
//! | `acquisition` | [`AcquisitionChain`] with [`RemoteFetchStrategy`] and [`LocalExtractionStrategy`] |
//! | `registry` | [`DirectoryPackageRegistry`], a filesystem [`LocalPackageRegistry`] |
//! | `dispatcher` | [`RelayDispatcher`], the runner and per-job worker |
//! | `progress` | [`ProgressThrottle`] for `RelayProgress` events |
//!
//! Build a dispatcher with [`build_relay_dispatcher`] and use it through
//! [`RelayDispatcherPort`].

// Re-export core types for convenience
pub use pkgrelay_core::{
    AssetRequest, CancelOutcome, DispatcherConfig, Job, JobHandle, JobId, JobState,
    LocalPackageRegistry, QueueSnapshot, RelayDispatcherPort, RelayError, RelayEvent,
};

mod acquisition;
mod dispatcher;
mod progress;
mod queue;
mod registry;

pub use acquisition::{
    Acquired, AcquisitionChain, AcquisitionStrategy, LocalExtractionStrategy, RemoteFetchStrategy,
};
pub use dispatcher::{RelayDispatcher, RelayDispatcherDeps, build_relay_dispatcher};
pub use progress::ProgressThrottle;
pub use queue::{EnqueuePlan, JobQueue, MergeOutcome, RelayQueue, RestoreSummary};
pub use registry::{DirectoryPackageRegistry, MANIFEST_FILE};
