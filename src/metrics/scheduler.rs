//! Per-scheduler gauges: unhandled task count and worker busy fraction.
//!
//! Gauges are registered under the scheduler's name as category, so a
//! scheduler called `ingest` publishes `ingest.unhandled_task_count` and
//! `ingest.busy_fraction`.

use std::sync::Arc;

use super::{FractionGauge, GaugeConfig, IntegerGauge, MetricsSink};
use crate::core::ObjectCounter;

/// Name of the unhandled task count gauge.
pub const UNHANDLED_TASK_COUNT: &str = "unhandled_task_count";

/// Name of the busy fraction gauge.
pub const BUSY_FRACTION: &str = "busy_fraction";

/// Gauges a scheduler publishes, each optional.
#[derive(Debug, Clone, Default)]
pub struct SchedulerMetrics {
    unhandled: Option<Arc<IntegerGauge>>,
    busy: Option<Arc<FractionGauge>>,
}

impl SchedulerMetrics {
    /// Register the enabled gauges for `scheduler` with `sink`.
    #[must_use]
    pub fn new(sink: &dyn MetricsSink, scheduler: &str, unhandled: bool, busy: bool) -> Self {
        Self {
            unhandled: unhandled.then(|| {
                sink.integer_gauge(
                    &GaugeConfig::new(scheduler, UNHANDLED_TASK_COUNT)
                        .with_description("units admitted and not yet handled"),
                )
            }),
            busy: busy.then(|| {
                sink.fraction_gauge(
                    &GaugeConfig::new(scheduler, BUSY_FRACTION)
                        .with_description("fraction of time the worker spends handling tasks"),
                )
            }),
        }
    }

    /// Unhandled task count gauge, if enabled.
    #[must_use]
    pub fn unhandled_gauge(&self) -> Option<&Arc<IntegerGauge>> {
        self.unhandled.as_ref()
    }

    /// Busy fraction gauge, if enabled.
    #[must_use]
    pub fn busy_gauge(&self) -> Option<&Arc<FractionGauge>> {
        self.busy.as_ref()
    }

    /// Wrap `counter` so every ramp is mirrored into the unhandled gauge.
    /// Returns `counter` unchanged when that gauge is disabled.
    #[must_use]
    pub fn meter(&self, counter: Arc<dyn ObjectCounter>) -> Arc<dyn ObjectCounter> {
        match &self.unhandled {
            Some(gauge) => Arc::new(MeteredObjectCounter::new(counter, Arc::clone(gauge))),
            None => counter,
        }
    }
}

/// Counter decorator that adds each admitted weight to a gauge and subtracts
/// each released one.
///
/// Updates are deltas, so concurrent ramps never leave a stale value behind.
/// The gauge may briefly trail the counter while a ramp is in progress.
#[derive(Debug)]
pub struct MeteredObjectCounter {
    inner: Arc<dyn ObjectCounter>,
    gauge: Arc<IntegerGauge>,
}

impl MeteredObjectCounter {
    /// Mirror `inner` into `gauge`.
    #[must_use]
    pub fn new(inner: Arc<dyn ObjectCounter>, gauge: Arc<IntegerGauge>) -> Self {
        gauge.set(i64::try_from(inner.count()).unwrap_or(i64::MAX));
        Self { inner, gauge }
    }

    fn delta(weight: u64) -> i64 {
        i64::try_from(weight).unwrap_or(i64::MAX)
    }
}

impl ObjectCounter for MeteredObjectCounter {
    fn on_ramp(&self, weight: u64) {
        self.inner.on_ramp(weight);
        self.gauge.add(Self::delta(weight));
    }

    fn attempt_on_ramp(&self, weight: u64) -> bool {
        let admitted = self.inner.attempt_on_ramp(weight);
        if admitted {
            self.gauge.add(Self::delta(weight));
        }
        admitted
    }

    fn force_on_ramp(&self, weight: u64) {
        self.inner.force_on_ramp(weight);
        self.gauge.add(Self::delta(weight));
    }

    fn off_ramp(&self, weight: u64) {
        // Gauge first, so it already reads zero when `wait_until_empty` returns.
        self.gauge.add(-Self::delta(weight));
        self.inner.off_ramp(weight);
    }

    fn count(&self) -> u64 {
        self.inner.count()
    }

    fn wait_until_empty(&self) {
        self.inner.wait_until_empty();
    }
}
