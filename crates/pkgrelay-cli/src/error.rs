//! CLI-specific error types and mappings.
//!
//! Maps pipeline and adapter errors to exit codes and user-facing messages.

use pkgrelay_core::{RelayError, TransportError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Pipeline error without a more specific mapping.
    #[error("{0}")]
    Relay(String),

    /// Argument or request validation error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// The queue is at capacity.
    #[error("Queue is full: {0}")]
    Busy(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// The relay server or distribution service could not be used.
    #[error("Remote error: {0}")]
    Remote(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Relay(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Remote(_) => 69,   // EX_UNAVAILABLE
            Self::Database(_) => 73, // EX_CANTCREAT (closest fit)
            Self::Io(_) => 74,       // EX_IOERR
            Self::Busy(_) => 75,     // EX_TEMPFAIL
            Self::Config(_) => 78,   // EX_CONFIG
        }
    }
}

impl From<RelayError> for CliError {
    fn from(err: RelayError) -> Self {
        let message = err.user_message();
        match err {
            RelayError::InvalidRequest { .. } => Self::Arguments(message),
            RelayError::QueueFull { .. } => Self::Busy(message),
            RelayError::Storage { .. } => Self::Database(message),
            _ => Self::Relay(message),
        }
    }
}

impl From<TransportError> for CliError {
    fn from(err: TransportError) -> Self {
        Self::Remote(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
