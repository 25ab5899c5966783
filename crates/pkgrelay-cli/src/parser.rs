//! Main CLI parser and top-level argument handling.
//!
//! Global options carry the endpoint and credential configuration; every
//! one of them falls back to a `PKGRELAY_*` environment variable, and a
//! `.env` file is loaded before parsing.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::commands::Commands;

/// Relay packages from an acquisition source to private relay storage.
#[derive(Parser)]
#[command(name = "pkgrelay")]
#[command(about = "Relay application packages to a private storage endpoint")]
#[command(version)]
pub struct Cli {
    /// Override the data directory (database and credential key)
    #[arg(long = "data-dir", env = "PKGRELAY_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub endpoints: EndpointArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Endpoint, credential and dispatcher options.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Base URL of the relay storage server
    #[arg(long, env = "PKGRELAY_RELAY_URL", global = true)]
    pub relay_url: Option<String>,

    /// Base URL of the remote distribution service
    #[arg(long, env = "PKGRELAY_DISTRIBUTION_URL", global = true)]
    pub distribution_url: Option<String>,

    /// Fixed bearer token for the relay server
    #[arg(long, env = "PKGRELAY_RELAY_TOKEN", global = true, hide_env_values = true)]
    pub relay_token: Option<String>,

    /// Fixed token for the distribution service
    #[arg(long, env = "PKGRELAY_DISTRIBUTION_TOKEN", global = true, hide_env_values = true)]
    pub distribution_token: Option<String>,

    /// Endpoint that mints fresh tokens for either domain
    #[arg(long, env = "PKGRELAY_TOKEN_REFRESH_URL", global = true)]
    pub token_refresh_url: Option<String>,

    /// Secret presented to the token endpoint
    #[arg(long, env = "PKGRELAY_TOKEN_SECRET", global = true, hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Directory of locally installed packages used as the fallback source
    #[arg(long, env = "PKGRELAY_PACKAGES_DIR", global = true)]
    pub packages_dir: Option<PathBuf>,

    /// Jobs relayed at the same time
    #[arg(long, env = "PKGRELAY_MAX_CONCURRENT", global = true)]
    pub max_concurrent: Option<usize>,
}
