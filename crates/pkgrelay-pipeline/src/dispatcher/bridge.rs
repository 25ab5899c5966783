//! Progress bridge: watch channel to rate-limited `RelayProgress` events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pkgrelay_core::{JobId, RelayEvent, RelayEventEmitterPort, TransferProgress};

use crate::progress::ProgressThrottle;

/// Spawn a task forwarding upload progress for one job.
///
/// The task ends when `finished` fires (after emitting the last counters
/// it has not yet reported), when `cancel` fires (no final event; the
/// `Failed(Cancelled)` state change is final), or when the sender is gone.
pub(super) fn spawn_progress_bridge(
    events: Arc<dyn RelayEventEmitterPort>,
    id: JobId,
    mut rx: watch::Receiver<TransferProgress>,
    interval: Duration,
    cancel: CancellationToken,
    finished: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut throttle = ProgressThrottle::new(interval);
        let mut last_emitted: Option<TransferProgress> = None;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => return,

                () = finished.cancelled() => break,

                changed = rx.changed() => {
                    if changed.is_err() {
                        // Sender dropped; the worker is about to settle.
                        finished.cancelled().await;
                        break;
                    }
                    let current = *rx.borrow_and_update();
                    if throttle.should_emit() {
                        events.emit(RelayEvent::RelayProgress { id, progress: current });
                        last_emitted = Some(current);
                    }
                }
            }
        }

        let current = *rx.borrow();
        if !cancel.is_cancelled() && current.sent > 0 && last_emitted != Some(current) {
            events.emit(RelayEvent::RelayProgress { id, progress: current });
        }
    })
}
