//! Credential ports.
//!
//! # Design
//!
//! - `CredentialStore` is what the pipeline consumes: read the current token,
//!   or ask for exactly one refresh.
//! - `TokenProvider` is the external identity source (sign-in flow, token
//!   endpoint) that actually mints tokens.
//! - `CredentialCachePort` is durable encrypted storage for the last good
//!   token per domain.

use async_trait::async_trait;

use super::RepositoryError;
use crate::credentials::{AuthError, Credential, CredentialDomain};

/// Supplies and refreshes bearer tokens per credential domain.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current usable credential, or `None` if missing or expired.
    async fn get_token(&self, domain: CredentialDomain) -> Option<Credential>;

    /// Obtain a fresh credential.
    ///
    /// Concurrent callers for the same domain share a single provider call.
    async fn refresh_token(&self, domain: CredentialDomain) -> Result<Credential, AuthError>;
}

/// External source of fresh tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Mint a new credential for `domain`.
    async fn fetch_token(&self, domain: CredentialDomain) -> Result<Credential, AuthError>;

    /// A pre-issued credential that takes precedence over any cached one.
    ///
    /// Providers that mint tokens return `None`.
    fn fixed(&self) -> Option<Credential> {
        None
    }
}

/// Durable storage for cached credentials.
#[async_trait]
pub trait CredentialCachePort: Send + Sync {
    /// Load the cached credential for a domain.
    async fn load(&self, domain: CredentialDomain) -> Result<Option<Credential>, RepositoryError>;

    /// Replace the cached credential for a domain.
    async fn save(
        &self,
        domain: CredentialDomain,
        credential: &Credential,
    ) -> Result<(), RepositoryError>;

    /// Drop the cached credential for a domain.
    async fn clear(&self, domain: CredentialDomain) -> Result<(), RepositoryError>;
}
