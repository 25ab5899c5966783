//! Core domain types and port definitions for pkgrelay.
//!
//! pkgrelay relays application packages from an acquisition source (the
//! remote distribution service, or a locally installed copy) to a private
//! relay storage endpoint. This crate holds everything the pipeline shares
//! and no adapter code:
//!
//! - [`job`]: requests, jobs, failure detail, errors and events
//! - [`acquisition`]: strategy results carrying streaming readers
//! - [`credentials`]: credential domains and the single-flight store
//! - [`ports`]: trait seams implemented by the db, http and pipeline crates
//! - [`paths`], [`settings`]: data locations and defaults

pub mod acquisition;
pub mod credentials;
pub mod job;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use acquisition::{AcquisitionResult, AssetStream};
pub use credentials::{
    AuthError, CachedCredentialStore, Credential, CredentialDomain, StaticTokenProvider,
};
pub use job::{
    AssetRequest, EnqueueOutcome, FailureReason, Job, JobHandle, JobId, JobState, QueueSnapshot,
    RelayError, RelayEvent, StrategyAttempt, TransferProgress, UnavailableReason,
};
pub use paths::{PathError, ResolvedPaths, data_root};
pub use ports::{
    BroadcastRelayEmitter, CancelOutcome, CredentialCachePort, CredentialStore, DeviceId,
    DeviceProfile, DispatcherConfig, DistributionError, DistributionServicePort,
    DistributionSession, EntitlementGrant, InstalledBinary, JobRepositoryPort,
    LocalPackageRegistry, NoopRelayEmitter, RegistryError, RelayDispatcherPort, RelayEventEmitterPort,
    RelayPayload, RelayReceipt, RelayTransportPort, RemoteContent, RemoteEntry, RepositoryError,
    TokenProvider, TransportError,
};
pub use settings::{CredentialSettings, DEFAULT_CHANNEL, DEFAULT_TRANSFER_WINDOW, DEFAULT_VARIANT};
