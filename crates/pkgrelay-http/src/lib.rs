//! HTTP adapters for pkgrelay.
//!
//! - [`HttpRelayTransport`]: streams acquired assets to the relay storage
//!   server through a bounded transfer window
//! - [`HttpDistributionClient`]: the four-step remote distribution protocol
//! - [`HttpTokenProvider`]: refreshes credentials from a token endpoint
//! - [`RemoteRelayRequester`]: asks the relay server to fetch an asset itself
//!
//! All adapters share one [`HttpClientConfig`]. Internal `reqwest` errors are
//! mapped to core port errors before they leave this crate.
#![deny(unsafe_code)]

mod config;
mod distribution;
mod error;
mod relay;
mod remote_request;
mod stream;
mod token;

// ============================================================================
// Public API
// ============================================================================

// Configuration
pub use config::HttpClientConfig;

// Adapters
pub use distribution::HttpDistributionClient;
pub use relay::HttpRelayTransport;
pub use remote_request::RemoteRelayRequester;
pub use token::HttpTokenProvider;

// Errors
pub use error::{HttpError, HttpResult};

// Body streaming
pub use stream::{BoundedChunks, TransferMeter};

