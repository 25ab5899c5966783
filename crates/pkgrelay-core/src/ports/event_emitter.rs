//! Relay event emitter port.
//!
//! This port abstracts event emission, allowing the dispatcher to emit
//! events without coupling to how they are delivered (log, channel, UI).

use tokio::sync::broadcast;

use crate::job::RelayEvent;

/// Port for emitting relay events.
///
/// Implementations must not block; buffer or drop instead.
pub trait RelayEventEmitterPort: Send + Sync {
    /// Emit a relay event.
    fn emit(&self, event: RelayEvent);
}

/// A no-op emitter for tests and headless contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRelayEmitter;

impl NoopRelayEmitter {
    /// Create a new no-op emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RelayEventEmitterPort for NoopRelayEmitter {
    fn emit(&self, _event: RelayEvent) {
        // Intentionally do nothing
    }
}

/// Fans events out to any number of subscribers.
///
/// Slow subscribers lag and lose the oldest events rather than blocking
/// the dispatcher.
#[derive(Debug, Clone)]
pub struct BroadcastRelayEmitter {
    tx: broadcast::Sender<RelayEvent>,
}

impl BroadcastRelayEmitter {
    /// Create an emitter buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }
}

impl RelayEventEmitterPort for BroadcastRelayEmitter {
    fn emit(&self, event: RelayEvent) {
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }
}
