//! Enqueue command handler.

use anyhow::Result;

use pkgrelay_core::{AssetRequest, EnqueueOutcome, RelayDispatcherPort};

use crate::bootstrap::RelayContext;
use crate::commands::AssetArgs;
use crate::error::CliError;

/// Queue a package and print its job id.
///
/// An equal request that is still pending keeps its job; a finished one
/// is queued again under the same id.
pub async fn execute(ctx: &RelayContext, asset: AssetArgs) -> Result<()> {
    let request = AssetRequest::from(asset);
    let handle = ctx
        .dispatcher()
        .enqueue(request)
        .await
        .map_err(CliError::from)?;

    println!("{}", handle.id);
    match handle.outcome {
        EnqueueOutcome::Created => {}
        EnqueueOutcome::Existing => eprintln!("Already {}; nothing queued.", handle.state),
        EnqueueOutcome::Requeued => eprintln!("Finished job queued again."),
    }
    Ok(())
}
