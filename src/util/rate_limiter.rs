//! Minimum-interval rate limiting.

use std::time::{Duration, Instant};

/// Allows an action at most once per `min_interval`.
///
/// Callers pass the current instant, so the limiter works with any clock.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_triggered: Option<Instant>,
    denied: u64,
}

impl RateLimiter {
    /// Limiter that has never triggered.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_triggered: None,
            denied: 0,
        }
    }

    /// Whether a trigger at `now` would be allowed. Does not change state.
    #[must_use]
    pub fn is_allowed(&self, now: Instant) -> bool {
        self.last_triggered
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval)
    }

    /// Trigger if allowed. On success the denied counter resets.
    pub fn request_and_trigger(&mut self, now: Instant) -> bool {
        if self.is_allowed(now) {
            self.last_triggered = Some(now);
            self.denied = 0;
            true
        } else {
            self.denied += 1;
            false
        }
    }

    /// Requests denied since the last successful trigger.
    #[must_use]
    pub const fn denied_count(&self) -> u64 {
        self.denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_allowed() {
        let mut limiter = RateLimiter::new(Duration::from_secs(10));
        assert!(limiter.request_and_trigger(Instant::now()));
    }

    #[test]
    fn test_requests_within_interval_are_denied() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_secs(10));

        assert!(limiter.request_and_trigger(start));
        assert!(!limiter.request_and_trigger(start + Duration::from_secs(1)));
        assert!(!limiter.request_and_trigger(start + Duration::from_secs(9)));
        assert_eq!(limiter.denied_count(), 2);

        assert!(limiter.request_and_trigger(start + Duration::from_secs(10)));
        assert_eq!(limiter.denied_count(), 0);
    }

    #[test]
    fn test_zero_interval_always_allows() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new(Duration::ZERO);
        assert!(limiter.request_and_trigger(now));
        assert!(limiter.request_and_trigger(now));
    }
}
