//! Shared fixtures for HTTP adapter tests.

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use pkgrelay_core::{
    CachedCredentialStore, Credential, CredentialDomain, CredentialSettings, DeviceId,
    DistributionSession, StaticTokenProvider,
};
use pkgrelay_http::HttpClientConfig;
use tokio::io::{AsyncRead, ReadBuf};

/// Credential store with a static token for one domain.
pub fn store_with(domain: CredentialDomain, token: &str) -> Arc<CachedCredentialStore> {
    Arc::new(
        CachedCredentialStore::new(CredentialSettings::default())
            .with_provider(domain, Arc::new(StaticTokenProvider::new(token, "test"))),
    )
}

/// Credential store with no providers at all.
pub fn empty_store() -> Arc<CachedCredentialStore> {
    Arc::new(CachedCredentialStore::new(CredentialSettings::default()))
}

/// Config pointing every adapter at a mock server.
pub fn config_for(uri: &str) -> HttpClientConfig {
    HttpClientConfig::new()
        .with_relay_url(uri)
        .with_distribution_url(uri)
}

/// A checked-in session for distribution steps after checkin.
pub fn session() -> DistributionSession {
    DistributionSession {
        credential: Credential::new("dist-token", "checkin"),
        device_id: DeviceId::new("3f2a"),
    }
}

/// Reader that flips a flag when dropped.
pub struct DropFlagReader<R> {
    inner: R,
    dropped: Arc<AtomicBool>,
}

impl<R> DropFlagReader<R> {
    pub fn new(inner: R) -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner,
                dropped: Arc::clone(&dropped),
            },
            dropped,
        )
    }
}

impl<R> Drop for DropFlagReader<R> {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for DropFlagReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
