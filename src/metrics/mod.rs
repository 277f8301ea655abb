//! Metrics sink abstraction and gauge types.
//!
//! Components never talk to a metrics backend directly. They ask a
//! [`MetricsSink`] for a gauge by [`GaugeConfig`] ("get or create") and record
//! into it; the sink decides what happens to the values.

pub mod memory;
pub mod scheduler;

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use memory::InMemoryMetrics;
pub use scheduler::{MeteredObjectCounter, SchedulerMetrics};

/// Identity and description of a gauge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GaugeConfig {
    /// Grouping, e.g. `platform`.
    pub category: String,
    /// Name unique within the category.
    pub name: String,
    /// Human readable description.
    pub description: String,
}

impl GaugeConfig {
    /// Gauge config with an empty description.
    #[must_use]
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// `category.name`, the key a sink registers the gauge under.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}.{}", self.category, self.name)
    }
}

/// Gauge holding a duration.
#[derive(Debug)]
pub struct DurationGauge {
    config: GaugeConfig,
    nanos: AtomicU64,
}

impl DurationGauge {
    /// Gauge at zero.
    #[must_use]
    pub const fn new(config: GaugeConfig) -> Self {
        Self {
            config,
            nanos: AtomicU64::new(0),
        }
    }

    /// Gauge identity.
    #[must_use]
    pub const fn config(&self) -> &GaugeConfig {
        &self.config
    }

    /// Record a value. Durations beyond ~584 years saturate.
    pub fn set(&self, value: Duration) {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.store(nanos, Ordering::Relaxed);
    }

    /// Last recorded value.
    #[must_use]
    pub fn get(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// Gauge holding a signed integer.
#[derive(Debug)]
pub struct IntegerGauge {
    config: GaugeConfig,
    value: AtomicI64,
}

impl IntegerGauge {
    /// Gauge at zero.
    #[must_use]
    pub const fn new(config: GaugeConfig) -> Self {
        Self {
            config,
            value: AtomicI64::new(0),
        }
    }

    /// Gauge identity.
    #[must_use]
    pub const fn config(&self) -> &GaugeConfig {
        &self.config
    }

    /// Record a value.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Add `delta`, which may be negative.
    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Last recorded value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge holding a fraction, stored as `f64` bits.
#[derive(Debug)]
pub struct FractionGauge {
    config: GaugeConfig,
    bits: AtomicU64,
}

impl FractionGauge {
    /// Gauge at zero.
    #[must_use]
    pub const fn new(config: GaugeConfig) -> Self {
        Self {
            config,
            bits: AtomicU64::new(0),
        }
    }

    /// Gauge identity.
    #[must_use]
    pub const fn config(&self) -> &GaugeConfig {
        &self.config
    }

    /// Record a value, clamped to `[0.0, 1.0]`. NaN records as zero.
    pub fn set(&self, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Last recorded value.
    #[must_use]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Metrics sink abstraction: get-or-create gauges by config.
///
/// Asking twice for the same config returns the same gauge.
pub trait MetricsSink: Send + Sync {
    /// Duration gauge for `config`.
    fn duration_gauge(&self, config: &GaugeConfig) -> Arc<DurationGauge>;

    /// Integer gauge for `config`.
    fn integer_gauge(&self, config: &GaugeConfig) -> Arc<IntegerGauge>;

    /// Fraction gauge for `config`.
    fn fraction_gauge(&self, config: &GaugeConfig) -> Arc<FractionGauge>;
}

impl fmt::Display for GaugeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_config_key() {
        let config = GaugeConfig::new("platform", "healthy").with_description("1 if healthy");
        assert_eq!(config.key(), "platform.healthy");
        assert_eq!(config.to_string(), "platform.healthy");
        assert_eq!(config.description, "1 if healthy");
    }

    #[test]
    fn test_duration_gauge_round_trip() {
        let gauge = DurationGauge::new(GaugeConfig::new("platform", "dwell"));
        assert_eq!(gauge.get(), Duration::ZERO);
        gauge.set(Duration::from_millis(1_500));
        assert_eq!(gauge.get(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_integer_gauge_set() {
        let gauge = IntegerGauge::new(GaugeConfig::new("platform", "healthy"));
        gauge.set(1);
        assert_eq!(gauge.get(), 1);
        gauge.set(-3);
        assert_eq!(gauge.get(), -3);
        gauge.add(5);
        gauge.add(-1);
        assert_eq!(gauge.get(), 1);
    }

    #[test]
    fn test_fraction_gauge_clamps() {
        let gauge = FractionGauge::new(GaugeConfig::new("worker", "busy_fraction"));
        assert!(gauge.get().abs() < f64::EPSILON);
        gauge.set(0.25);
        assert!((gauge.get() - 0.25).abs() < f64::EPSILON);
        gauge.set(3.0);
        assert!((gauge.get() - 1.0).abs() < f64::EPSILON);
        gauge.set(f64::NAN);
        assert!(gauge.get().abs() < f64::EPSILON);
    }
}
