//! List command handler.
//!
//! Displays every known job in queue order.

use anyhow::Result;

use pkgrelay_core::RelayDispatcherPort;

use crate::bootstrap::RelayContext;
use crate::error::CliError;
use crate::presentation::{job_header, job_row, print_separator};

/// Execute the list command.
pub async fn execute(ctx: &RelayContext, json: bool) -> Result<()> {
    let snapshot = ctx
        .dispatcher()
        .snapshot()
        .await
        .map_err(CliError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.jobs.is_empty() {
        println!("No jobs in the queue.");
        println!("Use 'pkgrelay enqueue <asset_id> <version>' to queue one.");
        return Ok(());
    }

    println!("{}", job_header());
    print_separator(120);
    for job in &snapshot.jobs {
        println!("{}", job_row(job));
    }
    print_separator(120);
    println!(
        "{} job(s): {} pending, {} active (capacity {})",
        snapshot.jobs.len(),
        snapshot.pending,
        snapshot.active,
        snapshot.max_size
    );
    Ok(())
}
