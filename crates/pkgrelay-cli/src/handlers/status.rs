//! Status command handler.

use anyhow::Result;

use pkgrelay_core::{JobId, RelayDispatcherPort};

use crate::bootstrap::RelayContext;
use crate::error::CliError;
use crate::presentation::job_detail;

/// Show one job.
pub async fn execute(ctx: &RelayContext, id: &JobId, json: bool) -> Result<()> {
    let job = ctx
        .dispatcher()
        .get_job(id)
        .await
        .map_err(CliError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        println!("{}", job_detail(&job));
    }
    Ok(())
}
