//! Port definitions (trait abstractions) for external systems.
//!
//! Ports are the seams between the relay pipeline and everything it talks
//! to. Adapters in `pkgrelay-db`, `pkgrelay-http` and `pkgrelay-pipeline`
//! implement them; the CLI wires concrete adapters together.
//!
//! # Design Rules
//!
//! - No adapter-specific types (no `sqlx`, no `reqwest`)
//! - All traits are `Send + Sync` for async compatibility
//! - Each port has its own error type mapped at the adapter boundary

mod credentials;
mod dispatcher;
mod distribution;
mod event_emitter;
mod job_repository;
mod package_registry;
mod relay_transport;

use thiserror::Error;

pub use credentials::{CredentialCachePort, CredentialStore, TokenProvider};
pub use dispatcher::{CancelOutcome, DispatcherConfig, RelayDispatcherPort};
pub use distribution::{
    DeviceId, DeviceProfile, DistributionError, DistributionServicePort, DistributionSession,
    EntitlementGrant, RemoteContent, RemoteEntry,
};
pub use event_emitter::{BroadcastRelayEmitter, NoopRelayEmitter, RelayEventEmitterPort};
pub use job_repository::JobRepositoryPort;
pub use package_registry::{InstalledBinary, LocalPackageRegistry, RegistryError};
pub use relay_transport::{RelayPayload, RelayReceipt, RelayTransportPort, TransportError};

/// Domain-specific errors for repository operations.
///
/// This error type abstracts away storage implementation details.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entity with the same identifier already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A constraint was violated (e.g., unique request tuple).
    #[error("Constraint violation: {0}")]
    Constraint(String),
}
