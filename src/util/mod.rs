//! Shared utilities.

pub mod busy_timer;
pub mod clock;
pub mod rate_limiter;
pub mod telemetry;

pub use busy_timer::BusyTimer;
pub use clock::{now_ms, Clock, ManualClock, SystemClock};
pub use rate_limiter::RateLimiter;
pub use telemetry::init_tracing;
