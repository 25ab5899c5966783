//! Main commands enum.

use clap::{Args, Subcommand};

use pkgrelay_core::{AssetRequest, DEFAULT_CHANNEL, DEFAULT_VARIANT, JobId};

/// Available pkgrelay commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queue a package for relaying
    Enqueue {
        #[command(flatten)]
        asset: AssetArgs,
    },

    /// Relay queued jobs until interrupted
    Run {
        /// Exit once the queue is drained
        #[arg(long)]
        once: bool,
    },

    /// Show one job
    Status {
        /// Job id
        #[arg(value_parser = parse_job_id)]
        job_id: JobId,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every known job in queue order
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cancel a queued job (removes it) or every pending job
    Cancel {
        /// Job id
        #[arg(value_parser = parse_job_id, required_unless_present = "all", conflicts_with = "all")]
        job_id: Option<JobId>,
        /// Remove every queued job
        #[arg(long)]
        all: bool,
    },

    /// Remove finished jobs from the queue
    Clear {
        /// Only this job (must be finished)
        #[arg(value_parser = parse_job_id, conflicts_with = "older_than_days")]
        job_id: Option<JobId>,
        /// Only jobs that finished more than this many days ago
        #[arg(long)]
        older_than_days: Option<u32>,
    },

    /// Ask the relay server to fetch a package on its own
    RequestRemote {
        #[command(flatten)]
        asset: AssetArgs,
    },

    /// Show resolved paths for all pkgrelay directories
    Paths,
}

/// Identifies one package build.
#[derive(Args, Debug, Clone)]
pub struct AssetArgs {
    /// Package identifier (e.g. com.example.app)
    pub asset_id: String,
    /// Version to relay
    pub version: String,
    /// Architecture variant
    #[arg(long, default_value = DEFAULT_VARIANT)]
    pub variant: String,
    /// Release channel
    #[arg(long, default_value = DEFAULT_CHANNEL)]
    pub channel: String,
}

impl From<AssetArgs> for AssetRequest {
    fn from(args: AssetArgs) -> Self {
        Self::new(args.asset_id, args.version, args.variant, args.channel)
    }
}

fn parse_job_id(s: &str) -> Result<JobId, String> {
    JobId::parse(s).map_err(|e| format!("invalid job id '{s}': {e}"))
}
