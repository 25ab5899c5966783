//! Cancel command handler.

use anyhow::Result;

use pkgrelay_core::{CancelOutcome, JobId, RelayDispatcherPort};

use crate::bootstrap::RelayContext;
use crate::error::CliError;

/// Cancel one job, or every pending job when `id` is `None`.
pub async fn execute(ctx: &RelayContext, id: Option<&JobId>) -> Result<()> {
    let dispatcher = ctx.dispatcher();

    let Some(id) = id else {
        let cancelled = dispatcher.cancel_all().await.map_err(CliError::from)?;
        println!("Cancelled {cancelled} job(s).");
        return Ok(());
    };

    match dispatcher.cancel(id).await.map_err(CliError::from)? {
        CancelOutcome::Removed => println!("Removed {id} from the queue."),
        CancelOutcome::Cancelling => println!("Stopping {id}."),
    }
    Ok(())
}
