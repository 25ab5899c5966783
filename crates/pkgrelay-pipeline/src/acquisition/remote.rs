//! Primary strategy: the remote distribution service.
//!
//! Four steps, each short-circuiting to `Unavailable` on failure:
//! checkin, metadata lookup, entitlement, content fetch. The only retry is
//! a single credential refresh around checkin.

use std::sync::Arc;

use async_trait::async_trait;

use pkgrelay_core::{
    AcquisitionResult, AssetRequest, Credential, CredentialDomain, CredentialStore, DeviceProfile,
    DistributionError, DistributionServicePort, DistributionSession, UnavailableReason,
};

use super::AcquisitionStrategy;

/// Fetches assets from the remote distribution service.
pub struct RemoteFetchStrategy {
    service: Arc<dyn DistributionServicePort>,
    credentials: Arc<dyn CredentialStore>,
    profile: DeviceProfile,
}

impl RemoteFetchStrategy {
    /// Create a strategy presenting the default device profile.
    pub fn new(
        service: Arc<dyn DistributionServicePort>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            service,
            credentials,
            profile: DeviceProfile::default(),
        }
    }

    /// Present a different device profile at checkin.
    #[must_use]
    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = profile;
        self
    }

    async fn refresh(&self) -> Result<Credential, UnavailableReason> {
        self.credentials
            .refresh_token(CredentialDomain::Distribution)
            .await
            .map_err(|e| UnavailableReason::auth(e.to_string()))
    }

    /// Check in, refreshing the distribution credential at most once.
    async fn checkin(&self) -> Result<DistributionSession, UnavailableReason> {
        let (credential, refreshed) =
            match self.credentials.get_token(CredentialDomain::Distribution).await {
                Some(credential) => (credential, false),
                None => {
                    tracing::debug!(target: "pkgrelay.acquire", "No distribution credential cached; refreshing");
                    (self.refresh().await?, true)
                }
            };

        match self.service.checkin(&credential, &self.profile).await {
            Ok(device_id) => Ok(DistributionSession {
                credential,
                device_id,
            }),
            Err(DistributionError::Auth(e)) if !refreshed => {
                tracing::debug!(target: "pkgrelay.acquire", error = %e, "Checkin rejected; refreshing credential once");
                let credential = self.refresh().await?;
                let device_id = self
                    .service
                    .checkin(&credential, &self.profile)
                    .await
                    .map_err(UnavailableReason::from)?;
                Ok(DistributionSession {
                    credential,
                    device_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, request: &AssetRequest) -> Result<AcquisitionResult, UnavailableReason> {
        let session = self.checkin().await?;
        tracing::debug!(target: "pkgrelay.acquire", asset_id = %request.asset_id, "Checked in");

        let entry = self
            .service
            .metadata(&session, &request.asset_id, &request.channel, &request.variant)
            .await?;
        tracing::debug!(
            target: "pkgrelay.acquire",
            doc_id = %entry.doc_id,
            latest = ?entry.latest_version,
            "Resolved remote entry"
        );

        let grant = self
            .service
            .entitlement(&session, &entry, &request.version)
            .await?;
        tracing::debug!(target: "pkgrelay.acquire", version = %grant.version, "Entitlement granted");

        let content = self.service.content(&session, &entry, &grant).await?;
        Ok(AcquisitionResult::RemoteStream {
            stream: content.stream,
            declared_length: content.length,
        })
    }
}

#[async_trait]
impl AcquisitionStrategy for RemoteFetchStrategy {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn acquire(&self, request: &AssetRequest) -> AcquisitionResult {
        self.fetch(request)
            .await
            .unwrap_or_else(AcquisitionResult::Unavailable)
    }
}
