//! Default values and credential lifetime settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialDomain;

/// Variant used when a caller does not name one.
pub const DEFAULT_VARIANT: &str = "arm64-v8a";

/// Channel used when a caller does not name one.
pub const DEFAULT_CHANNEL: &str = "release";

/// Default relay transfer window (16 KiB).
pub const DEFAULT_TRANSFER_WINDOW: usize = 16 * 1024;

/// Default number of jobs run at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 1;

/// Default capacity for non-terminal jobs.
pub const DEFAULT_MAX_QUEUE_SIZE: u32 = 50;

/// How long cached credentials are trusted before a refresh is forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSettings {
    /// Maximum age of a distribution-service token.
    pub distribution_max_age: Duration,
    /// Maximum age of a relay-endpoint token.
    pub relay_max_age: Duration,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            distribution_max_age: Duration::from_secs(55 * 60),
            relay_max_age: Duration::from_secs(12 * 60 * 60),
        }
    }
}

impl CredentialSettings {
    /// Maximum token age for a domain.
    pub const fn max_age(&self, domain: CredentialDomain) -> Duration {
        match domain {
            CredentialDomain::Distribution => self.distribution_max_age,
            CredentialDomain::Relay => self.relay_max_age,
        }
    }

    /// Set the distribution token lifetime.
    #[must_use]
    pub const fn with_distribution_max_age(mut self, max_age: Duration) -> Self {
        self.distribution_max_age = max_age;
        self
    }

    /// Set the relay token lifetime.
    #[must_use]
    pub const fn with_relay_max_age(mut self, max_age: Duration) -> Self {
        self.relay_max_age = max_age;
        self
    }
}
