//! Progress rate-limiting for relay events.

mod throttle;

pub use throttle::ProgressThrottle;
