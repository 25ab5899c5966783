//! Internal error types for HTTP operations.
//!
//! These errors are internal to `pkgrelay-http` and are mapped to core port
//! errors at the boundary.

use pkgrelay_core::{AuthError, DistributionError, TransportError};
use thiserror::Error;

/// Result type alias for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Longest response body kept in error messages.
const MAX_BODY_IN_ERROR: usize = 512;

/// Errors from talking to remote HTTP services.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("request to {url} failed with status {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
        /// Response body (truncated)
        body: String,
    },

    /// The server answered 2xx with a body we could not use.
    #[error("invalid response from {url}: {message}")]
    InvalidResponse {
        /// The URL that was requested
        url: String,
        /// Description of what was invalid
        message: String,
    },

    /// Network or HTTP client error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl HttpError {
    /// Build a status error from a response, consuming its body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Self::Status {
            status,
            url,
            body: truncate(body),
        }
    }

    /// HTTP status, when the server answered.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map to a distribution error for the checkin step.
    pub(crate) fn into_checkin_error(self) -> DistributionError {
        match self.status() {
            Some(401 | 403) => DistributionError::Auth(AuthError::rejected(self.to_string())),
            _ => self.into_distribution_error(),
        }
    }

    /// Map to a distribution error for the entitlement step.
    pub(crate) fn into_entitlement_error(self) -> DistributionError {
        match self.status() {
            Some(402 | 403) => DistributionError::Denied(self.to_string()),
            _ => self.into_distribution_error(),
        }
    }

    /// Default mapping for distribution service steps.
    pub(crate) fn into_distribution_error(self) -> DistributionError {
        match self.status() {
            Some(401) => DistributionError::Auth(AuthError::rejected(self.to_string())),
            Some(404) => DistributionError::NotFound(self.to_string()),
            _ => DistributionError::Unreachable(self.to_string()),
        }
    }
}

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status { status, body, .. } => Self::Rejected { status, body },
            HttpError::InvalidUrl(e) => Self::InvalidEndpoint(e.to_string()),
            other => Self::Io(other.to_string()),
        }
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_BODY_IN_ERROR {
        let mut cut = MAX_BODY_IN_ERROR;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> HttpError {
        HttpError::Status {
            status,
            url: "http://dist/details".to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn test_checkin_auth_statuses() {
        assert!(matches!(
            status(401).into_checkin_error(),
            DistributionError::Auth(_)
        ));
        assert!(matches!(
            status(403).into_checkin_error(),
            DistributionError::Auth(_)
        ));
    }

    #[test]
    fn test_entitlement_denied_statuses() {
        assert!(matches!(
            status(402).into_entitlement_error(),
            DistributionError::Denied(_)
        ));
        assert!(matches!(
            status(403).into_entitlement_error(),
            DistributionError::Denied(_)
        ));
    }

    #[test]
    fn test_default_mapping() {
        assert!(matches!(
            status(404).into_distribution_error(),
            DistributionError::NotFound(_)
        ));
        assert!(matches!(
            status(503).into_distribution_error(),
            DistributionError::Unreachable(_)
        ));
    }

    #[test]
    fn test_status_becomes_rejected_transport() {
        let err = HttpError::Status {
            status: 507,
            url: "http://relay".to_string(),
            body: "disk full".to_string(),
        };
        assert_eq!(
            TransportError::from(err),
            TransportError::Rejected {
                status: 507,
                body: "disk full".to_string()
            }
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(MAX_BODY_IN_ERROR);
        let cut = truncate(body);
        assert!(cut.len() <= MAX_BODY_IN_ERROR);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
