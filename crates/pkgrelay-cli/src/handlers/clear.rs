//! Clear command handler.

use anyhow::Result;

use pkgrelay_core::{JobId, RelayDispatcherPort};

use crate::bootstrap::RelayContext;
use crate::error::CliError;

/// Remove finished jobs.
///
/// With an id, only that job (it must be finished). With an age, only
/// jobs that finished more than that many days ago. Otherwise every
/// finished job.
pub async fn execute(
    ctx: &RelayContext,
    id: Option<&JobId>,
    older_than_days: Option<u32>,
) -> Result<()> {
    let dispatcher = ctx.dispatcher();

    if let Some(id) = id {
        dispatcher.clear(id).await.map_err(CliError::from)?;
        println!("Cleared {id}.");
        return Ok(());
    }

    let cleared = match older_than_days {
        Some(days) => dispatcher
            .prune_terminal(days)
            .await
            .map_err(CliError::from)?,
        None => dispatcher.clear_terminal().await.map_err(CliError::from)?,
    };
    println!("Cleared {cleared} finished job(s).");
    Ok(())
}
