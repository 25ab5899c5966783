//! Request-remote command handler.
//!
//! Asks the relay server to download a package itself instead of
//! streaming it from this device.

use anyhow::Result;

use pkgrelay_core::AssetRequest;

use crate::bootstrap::RelayContext;
use crate::commands::AssetArgs;
use crate::error::CliError;

/// Submit a server-side download request.
pub async fn execute(ctx: &RelayContext, asset: AssetArgs) -> Result<()> {
    let request = AssetRequest::from(asset);
    request
        .validate()
        .map_err(|field| CliError::Arguments(format!("{field} is empty or not path-safe")))?;

    let status = ctx
        .requester
        .request(&request)
        .await
        .map_err(CliError::from)?;
    println!(
        "Relay server accepted {} (status {status}).",
        request.destination_path()
    );
    Ok(())
}
