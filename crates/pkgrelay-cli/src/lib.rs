//! `pkgrelay` command-line adapter.
//!
//! The binary parses arguments ([`Cli`]), builds a [`RelayContext`] once in
//! [`bootstrap`] and hands it to the command handlers.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod lock;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, RelayContext, bootstrap};
pub use commands::Commands;
pub use error::CliError;
pub use lock::RunnerLock;
pub use parser::{Cli, EndpointArgs};
