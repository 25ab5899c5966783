//! Remote distribution service client.
//!
//! | Step        | Request                                        |
//! |-------------|------------------------------------------------|
//! | checkin     | `POST {base}/checkin` (JSON device profile)    |
//! | metadata    | `GET {base}/details?doc=&channel=&variant=`    |
//! | entitlement | `POST {base}/purchase` (form `doc`, `vc`)      |
//! | content     | `GET {base}/delivery?doc=&vc=&dtok=`           |
//!
//! Every step after checkin carries `Authorization: Bearer` and
//! `X-DFE-Device-Id`. The entitlement's grant token travels to delivery as
//! `dtok` (omitted when the service issued none). Delivery either streams
//! the binary directly or answers with a JSON pointer (`download_url`,
//! `size`) that is followed.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use url::Url;

use pkgrelay_core::{
    Credential, DeviceId, DeviceProfile, DistributionError, DistributionServicePort,
    DistributionSession, EntitlementGrant, RemoteContent, RemoteEntry,
};

use crate::config::HttpClientConfig;
use crate::error::{HttpError, HttpResult};

const DEVICE_ID_HEADER: &str = "X-DFE-Device-Id";

#[derive(Debug, Serialize)]
struct CheckinRequest<'a> {
    checkin: CheckinBuild<'a>,
    version: u32,
}

#[derive(Debug, Serialize)]
struct CheckinBuild<'a> {
    fingerprint: &'a str,
    model: &'a str,
    manufacturer: &'a str,
    sdk_version: u32,
    locale: &'a str,
    abis: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CheckinResponse {
    device_id: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    doc_id: Option<String>,
    #[serde(default)]
    latest_version: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PurchaseResponse {
    #[serde(default)]
    grant_token: String,
}

#[derive(Debug, Deserialize)]
struct DeliveryPointer {
    download_url: String,
    #[serde(default)]
    size: Option<u64>,
}

/// HTTP client for the remote distribution service.
pub struct HttpDistributionClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpDistributionClient {
    /// Create a client from configuration.
    pub fn new(config: &HttpClientConfig) -> HttpResult<Self> {
        let base_url = config.distribution_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;
        Ok(Self {
            client: config.build_client()?,
            base_url,
            timeout: config.timeout,
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> HttpResult<Url> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        session: &DistributionSession,
    ) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&session.credential.token)
            .header(DEVICE_ID_HEADER, session.device_id.as_str())
    }

    async fn send(request: reqwest::RequestBuilder) -> HttpResult<reqwest::Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(HttpError::from_response(response).await)
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> HttpResult<T> {
        let url = response.url().to_string();
        response
            .json::<T>()
            .await
            .map_err(|e| HttpError::InvalidResponse {
                url,
                message: e.to_string(),
            })
    }

    fn into_content(response: reqwest::Response, declared: Option<u64>) -> RemoteContent {
        let length = declared.or_else(|| response.content_length());
        let bytes = response.bytes_stream().map_err(io::Error::other);
        RemoteContent {
            stream: Box::new(StreamReader::new(Box::pin(bytes))),
            length,
        }
    }

    async fn fetch_device_id(
        &self,
        credential: &Credential,
        profile: &DeviceProfile,
    ) -> HttpResult<DeviceId> {
        let body = CheckinRequest {
            checkin: CheckinBuild {
                fingerprint: &profile.fingerprint,
                model: &profile.model,
                manufacturer: &profile.manufacturer,
                sdk_version: profile.sdk_version,
                locale: &profile.locale,
                abis: &profile.abis,
            },
            version: 3,
        };
        let request = self
            .client
            .post(self.url("checkin", &[])?)
            .timeout(self.timeout)
            .bearer_auth(&credential.token)
            .json(&body);
        let response: CheckinResponse = Self::json(Self::send(request).await?).await?;
        Ok(DeviceId::new(response.device_id))
    }

    async fn fetch_details(
        &self,
        session: &DistributionSession,
        asset_id: &str,
        channel: &str,
        variant: &str,
    ) -> HttpResult<DetailsResponse> {
        let url = self.url(
            "details",
            &[("doc", asset_id), ("channel", channel), ("variant", variant)],
        )?;
        let request = self
            .authorized(self.client.get(url), session)
            .timeout(self.timeout);
        Self::json(Self::send(request).await?).await
    }

    async fn fetch_grant(
        &self,
        session: &DistributionSession,
        doc_id: &str,
        version: &str,
    ) -> HttpResult<PurchaseResponse> {
        let request = self
            .authorized(self.client.post(self.url("purchase", &[])?), session)
            .timeout(self.timeout)
            .form(&[("doc", doc_id), ("vc", version)]);
        Self::json(Self::send(request).await?).await
    }

    async fn fetch_delivery(
        &self,
        session: &DistributionSession,
        doc_id: &str,
        grant: &EntitlementGrant,
    ) -> HttpResult<RemoteContent> {
        let mut query = vec![("doc", doc_id), ("vc", grant.version.as_str())];
        if !grant.grant_token.is_empty() {
            query.push(("dtok", grant.grant_token.as_str()));
        }
        let url = self.url("delivery", &query)?;
        let response = Self::send(self.authorized(self.client.get(url), session)).await?;

        let is_pointer = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if !is_pointer {
            return Ok(Self::into_content(response, None));
        }

        let pointer: DeliveryPointer = Self::json(response).await?;
        tracing::debug!(
            target: "pkgrelay.acquire",
            size = ?pointer.size,
            "Following delivery pointer"
        );
        let download = Self::send(self.client.get(Url::parse(&pointer.download_url)?)).await?;
        Ok(Self::into_content(download, pointer.size))
    }
}

#[async_trait]
impl DistributionServicePort for HttpDistributionClient {
    async fn checkin(
        &self,
        credential: &Credential,
        profile: &DeviceProfile,
    ) -> Result<DeviceId, DistributionError> {
        let device_id = self
            .fetch_device_id(credential, profile)
            .await
            .map_err(HttpError::into_checkin_error)?;
        tracing::debug!(target: "pkgrelay.acquire", "Checkin succeeded");
        Ok(device_id)
    }

    async fn metadata(
        &self,
        session: &DistributionSession,
        asset_id: &str,
        channel: &str,
        variant: &str,
    ) -> Result<RemoteEntry, DistributionError> {
        let details = self
            .fetch_details(session, asset_id, channel, variant)
            .await
            .map_err(HttpError::into_distribution_error)?;

        Ok(RemoteEntry {
            doc_id: details.doc_id.unwrap_or_else(|| asset_id.to_string()),
            channel: channel.to_string(),
            variant: variant.to_string(),
            latest_version: details.latest_version,
            title: details.title,
        })
    }

    async fn entitlement(
        &self,
        session: &DistributionSession,
        entry: &RemoteEntry,
        version: &str,
    ) -> Result<EntitlementGrant, DistributionError> {
        let purchase = self
            .fetch_grant(session, &entry.doc_id, version)
            .await
            .map_err(HttpError::into_entitlement_error)?;

        Ok(EntitlementGrant {
            version: version.to_string(),
            grant_token: purchase.grant_token,
        })
    }

    async fn content(
        &self,
        session: &DistributionSession,
        entry: &RemoteEntry,
        grant: &EntitlementGrant,
    ) -> Result<RemoteContent, DistributionError> {
        self.fetch_delivery(session, &entry.doc_id, grant)
            .await
            .map_err(HttpError::into_distribution_error)
    }
}
