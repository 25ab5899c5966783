//! Command handlers that delegate to the dispatcher.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &RelayContext, ...) -> Result<()>`
//! - Thin wrappers that:
//!   1. Turn CLI input into pipeline requests
//!   2. Call the dispatcher or an adapter
//!   3. Format output for the terminal
//!
//! Pipeline errors are converted to [`CliError`](crate::CliError) so the
//! binary can pick an exit code.

pub mod cancel;
pub mod clear;
pub mod enqueue;
pub mod list;
pub mod paths;
pub mod request_remote;
pub mod run;
pub mod status;
