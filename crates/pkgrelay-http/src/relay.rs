//! Relay transport over HTTP.
//!
//! Uploads go to `POST {base}/api/upload_stream?path={destination}` with
//! the raw asset bytes as an `application/octet-stream` body.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use url::Url;

use pkgrelay_core::{
    Credential, CredentialDomain, CredentialStore, RelayPayload, RelayReceipt, RelayTransportPort,
    TransportError,
};

use crate::config::HttpClientConfig;
use crate::error::{HttpError, HttpResult};
use crate::stream::{BoundedChunks, TransferMeter};

/// Streams assets to the relay storage server.
pub struct HttpRelayTransport {
    client: reqwest::Client,
    endpoint: Url,
    credentials: Arc<dyn CredentialStore>,
    transfer_window: usize,
}

impl HttpRelayTransport {
    /// Create a transport from configuration.
    pub fn new(
        config: &HttpClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> HttpResult<Self> {
        let base = config.relay_url.trim_end_matches('/');
        Ok(Self {
            client: config.build_client()?,
            endpoint: Url::parse(&format!("{base}/api/upload_stream"))?,
            credentials,
            transfer_window: config.transfer_window,
        })
    }

    fn upload_url(&self, destination: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("path", destination);
        url
    }

    async fn credential(&self) -> Result<Credential, TransportError> {
        if let Some(credential) = self.credentials.get_token(CredentialDomain::Relay).await {
            return Ok(credential);
        }
        self.credentials
            .refresh_token(CredentialDomain::Relay)
            .await
            .map_err(|e| TransportError::Credential(e.to_string()))
    }
}

#[async_trait]
impl RelayTransportPort for HttpRelayTransport {
    async fn relay(
        &self,
        destination: &str,
        payload: RelayPayload,
    ) -> Result<RelayReceipt, TransportError> {
        let RelayPayload {
            stream,
            length,
            progress,
        } = payload;

        let credential = self.credential().await?;
        let meter = Arc::new(TransferMeter::new(length, progress));
        let body = reqwest::Body::wrap_stream(BoundedChunks::new(
            stream,
            self.transfer_window,
            Arc::clone(&meter),
        ));

        tracing::debug!(
            target: "pkgrelay.relay",
            destination,
            length = ?length,
            window = self.transfer_window,
            "Starting upload"
        );

        let mut request = self
            .client
            .post(self.upload_url(destination))
            .bearer_auth(&credential.token)
            .header(CONTENT_TYPE, "application/octet-stream");
        if let Some(length) = length {
            request = request.header(CONTENT_LENGTH, length);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::from(HttpError::Network(e)))?;

        let status = response.status();
        if !status.is_success() {
            let err = TransportError::from(HttpError::from_response(response).await);
            tracing::warn!(
                target: "pkgrelay.relay",
                destination,
                status = status.as_u16(),
                sent = meter.sent(),
                "Relay endpoint rejected upload"
            );
            return Err(err);
        }

        let receipt = RelayReceipt {
            destination: destination.to_string(),
            bytes_sent: meter.sent(),
            peak_chunk: meter.peak(),
            status: status.as_u16(),
        };
        tracing::info!(
            target: "pkgrelay.relay",
            destination,
            bytes = receipt.bytes_sent,
            status = receipt.status,
            "Upload accepted"
        );
        Ok(receipt)
    }
}
