//! Ask the relay server to fetch an asset itself.
//!
//! `POST {base}/api/request_download` with form fields `package`,
//! `versionCode`, `arch` and `channel`. Any 2xx means the server accepted
//! the request; nothing is streamed from this side.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use pkgrelay_core::{AssetRequest, CredentialDomain, CredentialStore, TransportError};

use crate::config::HttpClientConfig;
use crate::error::{HttpError, HttpResult};

/// Client for the relay server's server-side download request.
pub struct RemoteRelayRequester {
    client: reqwest::Client,
    endpoint: Url,
    credentials: Arc<dyn CredentialStore>,
    timeout: Duration,
}

impl RemoteRelayRequester {
    /// Create a requester from configuration.
    pub fn new(
        config: &HttpClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> HttpResult<Self> {
        let base = config.relay_url.trim_end_matches('/');
        Ok(Self {
            client: config.build_client()?,
            endpoint: Url::parse(&format!("{base}/api/request_download"))?,
            credentials,
            timeout: config.timeout,
        })
    }

    /// Submit the request, returning the server's status code.
    pub async fn request(&self, request: &AssetRequest) -> Result<u16, TransportError> {
        let credential = match self.credentials.get_token(CredentialDomain::Relay).await {
            Some(credential) => credential,
            None => self
                .credentials
                .refresh_token(CredentialDomain::Relay)
                .await
                .map_err(|e| TransportError::Credential(e.to_string()))?,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .bearer_auth(&credential.token)
            .form(&[
                ("package", request.asset_id.as_str()),
                ("versionCode", request.version.as_str()),
                ("arch", request.variant.as_str()),
                ("channel", request.channel.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TransportError::from(HttpError::Network(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::from_response(response).await.into());
        }

        tracing::info!(
            target: "pkgrelay.relay",
            asset_id = %request.asset_id,
            version = %request.version,
            status = status.as_u16(),
            "Relay server accepted download request"
        );
        Ok(status.as_u16())
    }
}
