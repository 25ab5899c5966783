//! Relay worker pipeline.
//!
//! The worker runs one job in two phases, each raced against the job's
//! cancellation token. It operates on value types and borrowed ports with
//! no access to the dispatcher's locks; state transitions and events
//! between and after the phases belong to the dispatcher.
//!
//! Cancelling drops the in-flight future, and with it every stream the
//! phase had open.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use pkgrelay_core::{
    AssetRequest, FailureReason, RelayPayload, RelayReceipt, RelayTransportPort, StrategyAttempt,
    TransferProgress,
};

use crate::acquisition::{Acquired, AcquisitionChain};

/// Phase one: run the acquisition chain.
pub(crate) async fn acquire(
    chain: &AcquisitionChain,
    request: &AssetRequest,
    cancel: &CancellationToken,
) -> Result<Acquired, FailureReason> {
    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(FailureReason::Cancelled),

        outcome = chain.run(request) => {
            outcome.map_err(|attempts| FailureReason::NoSourceAvailable { attempts })
        }
    }
}

/// Phase two: stream the acquired bytes to `destination`.
pub(crate) async fn relay(
    transport: &dyn RelayTransportPort,
    destination: &str,
    acquired: Acquired,
    progress_tx: watch::Sender<TransferProgress>,
    cancel: &CancellationToken,
) -> Result<RelayReceipt, FailureReason> {
    let (stream, length) = acquired
        .result
        .into_stream()
        .map_err(|reason| FailureReason::NoSourceAvailable {
            attempts: vec![StrategyAttempt {
                strategy: acquired.strategy.to_string(),
                reason,
            }],
        })?;
    progress_tx.send_replace(TransferProgress {
        sent: 0,
        total: length,
    });
    let payload = RelayPayload::new(stream, length).with_progress(progress_tx);

    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(FailureReason::Cancelled),

        result = transport.relay(destination, payload) => result.map_err(FailureReason::from),
    }
}
