//! Builders to construct schedulers from settings or configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{SchedulerConfig, WiringConfig};
use crate::core::{
    logging_fault_handler, BackpressureObjectCounter, Capacity, ConcurrentTaskScheduler,
    DirectTaskScheduler, FaultHandler, MultiObjectCounter, ObjectCounter, SchedulerCore,
    SchedulerError, SchedulerSettings, SchedulerType, SequentialThreadTaskScheduler, Spawn,
    StandardObjectCounter, TaskScheduler, WiredScheduler,
};
use crate::metrics::{MetricsSink, SchedulerMetrics};

/// Check that `name` is non-empty and only uses ASCII letters, digits and `_`.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidName`] otherwise.
pub fn validate_name(name: &str) -> Result<(), SchedulerError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SchedulerError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn default_counter(capacity: Capacity) -> Arc<dyn ObjectCounter> {
    match capacity {
        Capacity::Bounded(limit) => BackpressureObjectCounter::new(limit) as Arc<dyn ObjectCounter>,
        Capacity::Unlimited => StandardObjectCounter::new() as Arc<dyn ObjectCounter>,
    }
}

/// Fluent builder for a single task scheduler.
///
/// Defaults: sequential thread, unlimited capacity, flushing and squelching
/// disabled, blocking insertion, logging fault handler, and a private counter.
pub struct TaskSchedulerBuilder {
    name: String,
    scheduler_type: SchedulerType,
    capacity: Capacity,
    flush_enabled: bool,
    squelching_enabled: bool,
    insertion_is_blocking: bool,
    fault_handler: Option<FaultHandler>,
    spawner: Option<Arc<dyn Spawn>>,
    on_ramp: Option<Arc<dyn ObjectCounter>>,
    off_ramp: Option<Arc<dyn ObjectCounter>>,
    metrics: SchedulerMetrics,
}

impl TaskSchedulerBuilder {
    /// Builder for a scheduler called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scheduler_type: SchedulerType::SequentialThread,
            capacity: Capacity::Unlimited,
            flush_enabled: false,
            squelching_enabled: false,
            insertion_is_blocking: true,
            fault_handler: None,
            spawner: None,
            on_ramp: None,
            off_ramp: None,
            metrics: SchedulerMetrics::default(),
        }
    }

    /// Builder preloaded from a scheduler configuration entry.
    #[must_use]
    pub fn from_config(name: impl Into<String>, config: &SchedulerConfig) -> Self {
        Self::new(name)
            .with_type(config.scheduler_type)
            .with_capacity(config.capacity())
            .with_flushing_enabled(config.flush_enabled)
            .with_squelching_enabled(config.squelching_enabled)
            .with_insertion_blocking(config.insertion_is_blocking)
    }

    /// Concurrency strategy.
    #[must_use]
    pub const fn with_type(mut self, scheduler_type: SchedulerType) -> Self {
        self.scheduler_type = scheduler_type;
        self
    }

    /// Bound outstanding work to `capacity` units.
    #[must_use]
    pub const fn with_unhandled_task_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Capacity::Bounded(capacity);
        self
    }

    /// Set the capacity directly, bounded or not.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Allow `flush`.
    #[must_use]
    pub const fn with_flushing_enabled(mut self, enabled: bool) -> Self {
        self.flush_enabled = enabled;
        self
    }

    /// Allow squelching to be toggled.
    #[must_use]
    pub const fn with_squelching_enabled(mut self, enabled: bool) -> Self {
        self.squelching_enabled = enabled;
        self
    }

    /// Whether `put` blocks while over capacity.
    #[must_use]
    pub const fn with_insertion_blocking(mut self, blocking: bool) -> Self {
        self.insertion_is_blocking = blocking;
        self
    }

    /// Receiver of handler failures.
    #[must_use]
    pub fn with_fault_handler(mut self, fault_handler: FaultHandler) -> Self {
        self.fault_handler = Some(fault_handler);
        self
    }

    /// Shared pool for concurrent schedulers.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Counter incremented on admission. Sharing one counter across several
    /// schedulers makes backpressure span all of them.
    #[must_use]
    pub fn with_on_ramp(mut self, counter: Arc<dyn ObjectCounter>) -> Self {
        self.on_ramp = Some(counter);
        self
    }

    /// Counter decremented on completion.
    #[must_use]
    pub fn with_off_ramp(mut self, counter: Arc<dyn ObjectCounter>) -> Self {
        self.off_ramp = Some(counter);
        self
    }

    /// Publish `<name>.unhandled_task_count` and, for sequential schedulers,
    /// `<name>.busy_fraction` to `sink`.
    #[must_use]
    pub fn with_metrics(mut self, sink: &dyn MetricsSink, unhandled: bool, busy: bool) -> Self {
        self.metrics = SchedulerMetrics::new(sink, &self.name, unhandled, busy);
        self
    }

    /// The scheduler's own counter always tracks its work; external counters
    /// are fed alongside it.
    fn counters(&mut self) -> (Arc<dyn ObjectCounter>, Arc<dyn ObjectCounter>) {
        let own = self.metrics.meter(default_counter(self.capacity));
        let combine = |external: Option<Arc<dyn ObjectCounter>>| -> Arc<dyn ObjectCounter> {
            match external {
                Some(external) => {
                    MultiObjectCounter::new(Arc::clone(&own), vec![external]) as Arc<dyn ObjectCounter>
                }
                None => Arc::clone(&own),
            }
        };
        (combine(self.on_ramp.take()), combine(self.off_ramp.take()))
    }

    /// Build the scheduler. Threaded schedulers still need
    /// [`TaskScheduler::start`].
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidName`] for a malformed name
    /// - [`SchedulerError::InvalidConfig`] for a zero capacity, a heartbeat
    ///   type, or a concurrent scheduler without a spawner
    pub fn build(mut self) -> Result<Arc<dyn TaskScheduler>, SchedulerError> {
        validate_name(&self.name)?;
        if self.capacity == Capacity::Bounded(0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "scheduler `{}` capacity must be greater than 0",
                self.name
            )));
        }

        let (on_ramp, off_ramp) = self.counters();
        let fault_handler = self.fault_handler.take().unwrap_or_else(logging_fault_handler);
        let settings = SchedulerSettings {
            name: self.name.clone(),
            capacity: self.capacity,
            flush_enabled: self.flush_enabled,
            squelching_enabled: self.squelching_enabled,
            insertion_is_blocking: self.insertion_is_blocking,
        };
        let core = SchedulerCore::new(settings, on_ramp, off_ramp, fault_handler);

        let scheduler: Arc<dyn TaskScheduler> = match self.scheduler_type {
            SchedulerType::Concurrent => {
                let pool = self.spawner.take().ok_or_else(|| {
                    SchedulerError::InvalidConfig(format!(
                        "concurrent scheduler `{}` requires a spawner",
                        self.name
                    ))
                })?;
                Arc::new(ConcurrentTaskScheduler::new(core, pool))
            }
            SchedulerType::SequentialThread => {
                let mut sequential = SequentialThreadTaskScheduler::new(core);
                if let Some(gauge) = self.metrics.busy_gauge() {
                    sequential = sequential.with_busy_gauge(Arc::clone(gauge));
                }
                Arc::new(sequential)
            }
            SchedulerType::Direct => Arc::new(DirectTaskScheduler::new(core)),
            SchedulerType::Heartbeat => {
                return Err(SchedulerError::InvalidConfig(format!(
                    "heartbeat scheduler `{}` must be built with HeartbeatScheduler::new",
                    self.name
                )))
            }
        };

        if self.scheduler_type != SchedulerType::SequentialThread
            && self.metrics.busy_gauge().is_some()
        {
            debug!(scheduler = %self.name, "Busy fraction is only measured on sequential workers");
        }
        info!(
            scheduler = %self.name,
            scheduler_type = %self.scheduler_type,
            capacity = ?self.capacity,
            "Scheduler built"
        );
        Ok(scheduler)
    }

    /// Build the scheduler together with its primary output wire, which
    /// carries every value its handlers return.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_wired<O>(self) -> Result<WiredScheduler<O>, SchedulerError>
    where
        O: Clone + Send + 'static,
    {
        self.build().map(WiredScheduler::new)
    }
}

/// Build every scheduler named in `config`, feeding concurrent ones from
/// `spawner`.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidConfig`] if the configuration does not
/// validate, or the first error from [`TaskSchedulerBuilder::build`].
pub fn build_schedulers(
    config: &WiringConfig,
    spawner: &Arc<dyn Spawn>,
) -> Result<HashMap<String, Arc<dyn TaskScheduler>>, SchedulerError> {
    config
        .validate()
        .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;

    let mut schedulers = HashMap::new();
    for (name, scheduler_config) in &config.schedulers {
        let scheduler = TaskSchedulerBuilder::from_config(name.clone(), scheduler_config)
            .with_spawner(Arc::clone(spawner))
            .build()?;
        schedulers.insert(name.clone(), scheduler);
    }
    Ok(schedulers)
}
