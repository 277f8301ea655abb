//! Rate-limited warnings about unhealthy schedulers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::util::telemetry::HEALTH_TARGET;
use crate::util::RateLimiter;

/// Emits at most one warning per scheduler per log period.
///
/// Each scheduler has its own limiter, so one noisy scheduler never hides
/// another.
#[derive(Debug)]
pub struct HealthMonitorLogger {
    threshold: Duration,
    period: Duration,
    limiters: HashMap<String, RateLimiter>,
}

impl HealthMonitorLogger {
    /// Logger warning about dwell times above `threshold`, at most once per
    /// `period` for each scheduler.
    #[must_use]
    pub fn new(threshold: Duration, period: Duration) -> Self {
        Self {
            threshold,
            period,
            limiters: HashMap::new(),
        }
    }

    /// Dwell time above which warnings are considered.
    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Report that `scheduler` has been over capacity for `dwell`.
    ///
    /// Returns whether a warning was emitted.
    pub fn report(
        &mut self,
        scheduler: &str,
        unprocessed: u64,
        capacity: u64,
        dwell: Duration,
        now: Instant,
    ) -> bool {
        if dwell <= self.threshold {
            return false;
        }

        let period = self.period;
        let limiter = self
            .limiters
            .entry(scheduler.to_string())
            .or_insert_with(|| RateLimiter::new(period));
        let suppressed = limiter.denied_count();
        if !limiter.request_and_trigger(now) {
            return false;
        }

        warn!(
            target: HEALTH_TARGET,
            scheduler,
            unprocessed,
            capacity,
            dwell_ms = u64::try_from(dwell.as_millis()).unwrap_or(u64::MAX),
            suppressed,
            "Scheduler has been over capacity beyond the health threshold"
        );
        true
    }
}
