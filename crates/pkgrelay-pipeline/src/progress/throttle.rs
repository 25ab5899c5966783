//! Progress throttling.
//!
//! Uploads report every chunk handed to the request body; at a 16 KiB
//! window that is thousands of updates per asset. Subscribers only need a
//! few per second.

use std::time::{Duration, Instant};

/// Rate-limiter for `RelayProgress` events of one job.
#[derive(Debug)]
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a throttle that allows one event per `min_interval`.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Check whether an event may be emitted now, and record it if so.
    pub fn should_emit(&mut self) -> bool {
        self.should_emit_at(Instant::now())
    }

    fn should_emit_at(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Whether anything has been emitted yet.
    pub const fn has_emitted(&self) -> bool {
        self.last_emit.is_some()
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}
