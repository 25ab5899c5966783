//! Run command handler.
//!
//! Drives the dispatcher in the foreground, printing events as they
//! arrive. Ctrl-C cancels running jobs and leaves queued ones for the
//! next run.
//!
//! Holds the runner lock for the data directory while running, and only
//! then restores the queue (failing jobs a previous runner left active).

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;

use pkgrelay_core::{JobState, RelayDispatcherPort};

use crate::bootstrap::RelayContext;
use crate::error::CliError;
use crate::lock::RunnerLock;
use crate::presentation::event_line;

/// Execute the run command.
///
/// With `once`, returns when nothing is pending or active; otherwise runs
/// until interrupted.
pub async fn execute(ctx: &RelayContext, once: bool) -> Result<()> {
    let dispatcher = ctx.dispatcher();
    let _lock = RunnerLock::acquire(&ctx.paths.runner_lock)?;
    let summary = dispatcher.restore().await.map_err(CliError::from)?;
    if !summary.interrupted.is_empty() {
        eprintln!(
            "{} job(s) left active by a previous run were marked interrupted.",
            summary.interrupted.len()
        );
    }

    let mut events = ctx.events.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", event_line(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let pending = dispatcher.snapshot().await.map_err(CliError::from)?.pending;
    tracing::info!(pending, once, "Starting relay runner");

    if once {
        tokio::select! {
            () = dispatcher.run_until_idle() => {}
            signal = tokio::signal::ctrl_c() => {
                signal?;
                eprintln!("Interrupted; cancelling running jobs.");
            }
        }
    } else {
        dispatcher.ensure_runner();
        tokio::signal::ctrl_c().await?;
        eprintln!("Interrupted; cancelling running jobs.");
    }

    let cancelled = dispatcher.shutdown().await;
    printer.abort();

    let snapshot = dispatcher.snapshot().await.map_err(CliError::from)?;
    let succeeded = count(&snapshot.jobs, JobState::Succeeded);
    let failed = count(&snapshot.jobs, JobState::Failed);
    println!(
        "{succeeded} succeeded, {failed} failed, {} still queued ({cancelled} cancelled on exit).",
        snapshot.pending
    );
    Ok(())
}

fn count(jobs: &[pkgrelay_core::Job], state: JobState) -> usize {
    jobs.iter().filter(|job| job.state == state).count()
}
