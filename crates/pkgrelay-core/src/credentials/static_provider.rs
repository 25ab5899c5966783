//! Fixed-token provider.

use async_trait::async_trait;

use super::{AuthError, Credential, CredentialDomain};
use crate::ports::TokenProvider;

/// Hands out a pre-issued token, e.g. one supplied through the environment
/// by an external sign-in flow.
///
/// The token is reported through [`TokenProvider::fixed`], so a store
/// hands it out in place of anything cached for the domain. Every call
/// re-stamps `issued_at`.
pub struct StaticTokenProvider {
    token: String,
    scope: String,
}

impl StaticTokenProvider {
    /// Create a provider for a fixed token.
    pub fn new(token: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self, domain: CredentialDomain) -> Result<Credential, AuthError> {
        if self.token.trim().is_empty() {
            return Err(AuthError::NotConfigured { domain });
        }
        Ok(Credential::new(self.token.clone(), self.scope.clone()))
    }

    fn fixed(&self) -> Option<Credential> {
        (!self.token.trim().is_empty())
            .then(|| Credential::new(self.token.clone(), self.scope.clone()))
    }
}
