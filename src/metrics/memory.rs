//! In-memory metrics sink for tests and embedding.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::{DurationGauge, FractionGauge, GaugeConfig, IntegerGauge, MetricsSink};

/// Keeps every gauge in process memory, keyed by `category.name`.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    durations: RwLock<HashMap<String, Arc<DurationGauge>>>,
    integers: RwLock<HashMap<String, Arc<IntegerGauge>>>,
    fractions: RwLock<HashMap<String, Arc<FractionGauge>>>,
}

impl InMemoryMetrics {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a duration gauge, if it exists.
    #[must_use]
    pub fn duration_value(&self, key: &str) -> Option<Duration> {
        self.durations.read().get(key).map(|gauge| gauge.get())
    }

    /// Current value of an integer gauge, if it exists.
    #[must_use]
    pub fn integer_value(&self, key: &str) -> Option<i64> {
        self.integers.read().get(key).map(|gauge| gauge.get())
    }

    /// Current value of a fraction gauge, if it exists.
    #[must_use]
    pub fn fraction_value(&self, key: &str) -> Option<f64> {
        self.fractions.read().get(key).map(|gauge| gauge.get())
    }

    /// Keys of every registered gauge, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .durations
            .read()
            .keys()
            .chain(self.integers.read().keys())
            .chain(self.fractions.read().keys())
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

fn get_or_create<G>(
    gauges: &RwLock<HashMap<String, Arc<G>>>,
    config: &GaugeConfig,
    create: impl FnOnce(GaugeConfig) -> G,
) -> Arc<G> {
    let key = config.key();
    if let Some(gauge) = gauges.read().get(&key) {
        return Arc::clone(gauge);
    }
    let mut gauges = gauges.write();
    Arc::clone(
        gauges
            .entry(key)
            .or_insert_with(|| Arc::new(create(config.clone()))),
    )
}

impl MetricsSink for InMemoryMetrics {
    fn duration_gauge(&self, config: &GaugeConfig) -> Arc<DurationGauge> {
        get_or_create(&self.durations, config, DurationGauge::new)
    }

    fn integer_gauge(&self, config: &GaugeConfig) -> Arc<IntegerGauge> {
        get_or_create(&self.integers, config, IntegerGauge::new)
    }

    fn fraction_gauge(&self, config: &GaugeConfig) -> Arc<FractionGauge> {
        get_or_create(&self.fractions, config, FractionGauge::new)
    }
}
