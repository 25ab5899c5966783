//! Caching credential store with single-flight refresh.
//!
//! # Concurrency Model
//!
//! - One `tokio::sync::Mutex` per domain guards the cached token and the
//!   last refresh result; the provider call happens while it is held
//! - A per-domain generation counter is read before waiting on the lock;
//!   if it moved while we waited, someone else refreshed and we reuse
//!   their result instead of calling the provider again
//! - A provider's `fixed` credential wins over the cache and is never
//!   written to it

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{AuthError, Credential, CredentialDomain};
use crate::ports::{CredentialCachePort, CredentialStore, TokenProvider};
use crate::settings::CredentialSettings;

#[derive(Default)]
struct SlotState {
    current: Option<Credential>,
    loaded: bool,
    last_refresh: Option<Result<Credential, AuthError>>,
}

#[derive(Default)]
struct DomainSlot {
    provider: Option<Arc<dyn TokenProvider>>,
    generation: AtomicU64,
    state: Mutex<SlotState>,
}

/// `CredentialStore` backed by token providers and an optional durable cache.
///
/// ```ignore
/// let store = CachedCredentialStore::new(CredentialSettings::default())
///     .with_cache(cache)
///     .with_provider(CredentialDomain::Relay, Arc::new(StaticTokenProvider::new(token, "relay")));
/// ```
pub struct CachedCredentialStore {
    settings: CredentialSettings,
    cache: Option<Arc<dyn CredentialCachePort>>,
    distribution: DomainSlot,
    relay: DomainSlot,
}

impl CachedCredentialStore {
    /// Create a store with no providers and no durable cache.
    pub fn new(settings: CredentialSettings) -> Self {
        Self {
            settings,
            cache: None,
            distribution: DomainSlot::default(),
            relay: DomainSlot::default(),
        }
    }

    /// Persist refreshed tokens and seed from this cache on first use.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CredentialCachePort>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the token provider for a domain.
    #[must_use]
    pub fn with_provider(
        mut self,
        domain: CredentialDomain,
        provider: Arc<dyn TokenProvider>,
    ) -> Self {
        self.slot_mut(domain).provider = Some(provider);
        self
    }

    /// Whether a provider is configured for a domain.
    pub fn has_provider(&self, domain: CredentialDomain) -> bool {
        self.slot(domain).provider.is_some()
    }

    /// Forget the token for a domain, in memory and in the durable cache.
    pub async fn invalidate(&self, domain: CredentialDomain) {
        let slot = self.slot(domain);
        let mut state = slot.state.lock().await;
        state.current = None;
        state.loaded = true;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear(domain).await {
                tracing::warn!(target: "pkgrelay.credentials", domain = %domain, error = %e, "Failed to clear cached credential");
            }
        }
    }

    const fn slot(&self, domain: CredentialDomain) -> &DomainSlot {
        match domain {
            CredentialDomain::Distribution => &self.distribution,
            CredentialDomain::Relay => &self.relay,
        }
    }

    const fn slot_mut(&mut self, domain: CredentialDomain) -> &mut DomainSlot {
        match domain {
            CredentialDomain::Distribution => &mut self.distribution,
            CredentialDomain::Relay => &mut self.relay,
        }
    }

    async fn load_cached(&self, domain: CredentialDomain) -> Option<Credential> {
        let cache = self.cache.as_ref()?;
        match cache.load(domain).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(target: "pkgrelay.credentials", domain = %domain, error = %e, "Ignoring unreadable cached credential");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialStore for CachedCredentialStore {
    async fn get_token(&self, domain: CredentialDomain) -> Option<Credential> {
        let slot = self.slot(domain);
        if let Some(fixed) = slot.provider.as_ref().and_then(|p| p.fixed()) {
            return Some(fixed);
        }
        let mut state = slot.state.lock().await;

        if !state.loaded {
            state.loaded = true;
            if state.current.is_none() {
                state.current = self.load_cached(domain).await;
            }
        }

        let max_age = self.settings.max_age(domain);
        state
            .current
            .as_ref()
            .filter(|c| !c.is_expired(max_age, Utc::now()))
            .cloned()
    }

    async fn refresh_token(&self, domain: CredentialDomain) -> Result<Credential, AuthError> {
        let slot = self.slot(domain);
        let Some(provider) = slot.provider.clone() else {
            return Err(AuthError::NotConfigured { domain });
        };

        let observed = slot.generation.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if slot.generation.load(Ordering::Acquire) != observed {
            if let Some(shared) = state.last_refresh.clone() {
                tracing::debug!(target: "pkgrelay.credentials", domain = %domain, "Reusing concurrent refresh result");
                return shared;
            }
        }

        tracing::debug!(target: "pkgrelay.credentials", domain = %domain, "Refreshing credential");
        let result = provider.fetch_token(domain).await;

        match &result {
            Ok(credential) => {
                state.current = Some(credential.clone());
                state.loaded = true;
                let persist = provider.fixed().is_none();
                if let Some(cache) = self.cache.as_ref().filter(|_| persist) {
                    if let Err(e) = cache.save(domain, credential).await {
                        tracing::warn!(target: "pkgrelay.credentials", domain = %domain, error = %e, "Failed to persist refreshed credential");
                    }
                }
                tracing::info!(target: "pkgrelay.credentials", domain = %domain, scope = %credential.scope, "Credential refreshed");
            }
            Err(e) => {
                tracing::warn!(target: "pkgrelay.credentials", domain = %domain, error = %e, "Credential refresh failed");
            }
        }

        state.last_refresh = Some(result.clone());
        slot.generation.fetch_add(1, Ordering::Release);
        result
    }
}
