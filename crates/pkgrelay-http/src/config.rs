//! Public configuration for the HTTP adapters.

use std::time::Duration;

use pkgrelay_core::DEFAULT_TRANSFER_WINDOW;

/// Configuration shared by the pkgrelay HTTP adapters.
///
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use pkgrelay_http::HttpClientConfig;
/// use std::time::Duration;
///
/// let config = HttpClientConfig::new()
///     .with_relay_url("https://relay.internal")
///     .with_timeout(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the relay storage server
    pub(crate) relay_url: String,
    /// Base URL of the remote distribution service
    pub(crate) distribution_url: String,
    /// Token endpoint used to refresh credentials
    pub(crate) token_url: Option<String>,
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
    /// Timeout for API calls (not applied to streamed uploads)
    pub(crate) timeout: Duration,
    /// Connection establishment timeout
    pub(crate) connect_timeout: Duration,
    /// Relay transfer window in bytes
    pub(crate) transfer_window: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:8080".to_string(),
            distribution_url: "http://127.0.0.1:8081".to_string(),
            token_url: None,
            user_agent: concat!("pkgrelay/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            transfer_window: DEFAULT_TRANSFER_WINDOW,
        }
    }
}

impl HttpClientConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relay server base URL.
    #[must_use]
    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    /// Set the distribution service base URL.
    #[must_use]
    pub fn with_distribution_url(mut self, url: impl Into<String>) -> Self {
        self.distribution_url = url.into();
        self
    }

    /// Set the token refresh endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Set the user agent string for HTTP requests.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the API request timeout.
    ///
    /// Defaults to 30 seconds. Uploads are not bounded by this.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the relay transfer window (minimum 1 byte).
    #[must_use]
    pub fn with_transfer_window(mut self, bytes: usize) -> Self {
        self.transfer_window = bytes.max(1);
        self
    }

    /// The configured token endpoint, if any.
    pub fn token_url(&self) -> Option<&str> {
        self.token_url.as_deref()
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .build()
    }
}
