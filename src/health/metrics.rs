//! Gauges published by the health monitor.

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::{DurationGauge, GaugeConfig, IntegerGauge, MetricsSink};

/// Gauge category shared by the health gauges.
pub const CATEGORY: &str = "platform";
/// Name of the longest-unhealthy-duration gauge.
pub const UNHEALTHY_DURATION: &str = "unhealthy_duration";
/// Name of the process health gauge.
pub const HEALTHY: &str = "healthy";

/// Longest unhealthy duration plus a boolean health flag.
#[derive(Debug, Clone)]
pub struct HealthMonitorMetrics {
    threshold: Duration,
    unhealthy_duration: Arc<DurationGauge>,
    healthy: Arc<IntegerGauge>,
}

impl HealthMonitorMetrics {
    /// Register the gauges with `sink`. The process counts as unhealthy once
    /// the longest dwell reaches `threshold`.
    #[must_use]
    pub fn new(sink: &dyn MetricsSink, threshold: Duration) -> Self {
        let unhealthy_duration = sink.duration_gauge(
            &GaugeConfig::new(CATEGORY, UNHEALTHY_DURATION)
                .with_description("Longest time any scheduler has been over capacity"),
        );
        let healthy = sink.integer_gauge(
            &GaugeConfig::new(CATEGORY, HEALTHY)
                .with_description("1 if every scheduler is within the health threshold, else 0"),
        );
        healthy.set(1);
        Self {
            threshold,
            unhealthy_duration,
            healthy,
        }
    }

    /// Record the longest dwell of this check.
    pub fn update(&self, longest_unhealthy: Duration) {
        self.unhealthy_duration.set(longest_unhealthy);
        self.healthy.set(i64::from(longest_unhealthy < self.threshold));
    }
}
