//! Credential types and the caching credential store.
//!
//! Two independent domains exist: the distribution service credential used
//! by remote acquisition, and the relay credential attached to uploads.
//! Each domain has its own provider, cache slot and refresh lock.

mod static_provider;
mod store;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use static_provider::StaticTokenProvider;
pub use store::CachedCredentialStore;

/// Which remote party a credential authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialDomain {
    /// Remote distribution service (checkin, metadata, entitlement, content).
    Distribution,
    /// Private relay storage endpoint.
    Relay,
}

impl CredentialDomain {
    /// Both domains, in a fixed order.
    pub const ALL: [Self; 2] = [Self::Distribution, Self::Relay];

    /// Convert to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Distribution => "distribution",
            Self::Relay => "relay",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "distribution" => Some(Self::Distribution),
            "relay" => Some(Self::Relay),
            _ => None,
        }
    }
}

impl fmt::Display for CredentialDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bearer token with provenance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The bearer token. Never logged.
    pub token: String,
    /// When the token was obtained.
    pub issued_at: DateTime<Utc>,
    /// Scope the token was issued for.
    pub scope: String,
}

impl Credential {
    /// Create a credential issued now.
    pub fn new(token: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::issued(token, scope, Utc::now())
    }

    /// Create a credential with an explicit issue time.
    pub fn issued(
        token: impl Into<String>,
        scope: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            issued_at,
            scope: scope.into(),
        }
    }

    /// Whether the token is older than `max_age` at `now`.
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return false;
        };
        now.signed_duration_since(self.issued_at) >= max_age
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Credential acquisition or validation failure.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthError {
    /// No provider is configured for the domain.
    #[error("no credential source configured for {domain}")]
    NotConfigured {
        /// The domain that has no provider.
        domain: CredentialDomain,
    },

    /// The remote party rejected the credential.
    #[error("credential rejected: {message}")]
    Rejected {
        /// Detail from the remote party.
        message: String,
    },

    /// The token provider could not produce a fresh credential.
    #[error("credential refresh failed: {message}")]
    RefreshFailed {
        /// Detail from the provider.
        message: String,
    },
}

impl AuthError {
    /// Create a rejected error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create a refresh failure.
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::RefreshFailed {
            message: message.into(),
        }
    }
}
