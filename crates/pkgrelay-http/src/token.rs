//! Token refresh over HTTP.
//!
//! `POST {token_url}` with form `domain={distribution|relay}` and,
//! when configured, a bearer secret identifying this installation.
//! The endpoint answers `{"token": "...", "scope": "..."}`.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use pkgrelay_core::{AuthError, Credential, CredentialDomain, TokenProvider};

use crate::config::HttpClientConfig;
use crate::error::{HttpError, HttpResult};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    scope: Option<String>,
}

/// Mints credentials from a token endpoint.
pub struct HttpTokenProvider {
    client: reqwest::Client,
    endpoint: Url,
    secret: Option<String>,
    timeout: std::time::Duration,
}

impl HttpTokenProvider {
    /// Create a provider for the given token endpoint.
    pub fn new(config: &HttpClientConfig, token_url: &str) -> HttpResult<Self> {
        Ok(Self {
            client: config.build_client()?,
            endpoint: Url::parse(token_url)?,
            secret: None,
            timeout: config.timeout,
        })
    }

    /// Authenticate refresh requests with a long-lived secret.
    #[must_use]
    pub fn with_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret.filter(|s| !s.is_empty());
        self
    }

    async fn request(&self, domain: CredentialDomain) -> HttpResult<TokenResponse> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .form(&[("domain", domain.as_str())]);
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(HttpError::from_response(response).await);
        }
        let url = response.url().to_string();
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| HttpError::InvalidResponse {
                url,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self, domain: CredentialDomain) -> Result<Credential, AuthError> {
        let response = self.request(domain).await.map_err(|e| match e.status() {
            Some(401 | 403) => AuthError::rejected(e.to_string()),
            _ => AuthError::refresh_failed(e.to_string()),
        })?;

        if response.token.is_empty() {
            return Err(AuthError::refresh_failed("token endpoint returned an empty token"));
        }

        tracing::debug!(target: "pkgrelay.credentials", %domain, "Fetched fresh token");
        let scope = response
            .scope
            .unwrap_or_else(|| domain.as_str().to_string());
        Ok(Credential::new(response.token, scope))
    }
}
