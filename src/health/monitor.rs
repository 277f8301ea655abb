//! Detection of sustained backlog across bounded schedulers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::logger::HealthMonitorLogger;
use super::metrics::HealthMonitorMetrics;
use crate::config::HealthMonitorConfig;
use crate::core::{HeartbeatScheduler, OutputWire, SchedulerError, SchedulerIntrospect};
use crate::metrics::MetricsSink;
use crate::util::Clock;

struct Watched {
    scheduler: Arc<dyn SchedulerIntrospect>,
    capacity: u64,
    last_healthy: Instant,
}

/// Watches bounded schedulers and reports the longest time any of them has
/// spent over capacity.
///
/// A scheduler is healthy while its unprocessed count is at or below its
/// capacity. Every healthy check refreshes its last-healthy instant; while
/// unhealthy that instant stays frozen, so `now - last_healthy` is the dwell
/// time. Unlimited schedulers are never watched.
///
/// [`check_system_health`](Self::check_system_health) only reports changes:
/// `None` means "same as last time", not "healthy".
pub struct HealthMonitor {
    watched: Vec<Watched>,
    clock: Arc<dyn Clock>,
    logger: HealthMonitorLogger,
    metrics: Option<HealthMonitorMetrics>,
    previously_reported: Duration,
}

impl HealthMonitor {
    /// Monitor over `schedulers`, warning once a scheduler has been unhealthy
    /// longer than `log_threshold`, at most once per `log_period` each.
    #[must_use]
    pub fn new(
        schedulers: Vec<Arc<dyn SchedulerIntrospect>>,
        clock: Arc<dyn Clock>,
        log_threshold: Duration,
        log_period: Duration,
    ) -> Self {
        let now = clock.now();
        let watched: Vec<Watched> = schedulers
            .into_iter()
            .filter_map(|scheduler| {
                scheduler.capacity().limit().map(|capacity| Watched {
                    scheduler,
                    capacity,
                    last_healthy: now,
                })
            })
            .collect();
        debug!(watched = watched.len(), "Health monitor created");

        Self {
            watched,
            clock,
            logger: HealthMonitorLogger::new(log_threshold, log_period),
            metrics: None,
            previously_reported: Duration::ZERO,
        }
    }

    /// Monitor tuned by `config`.
    #[must_use]
    pub fn from_config(
        schedulers: Vec<Arc<dyn SchedulerIntrospect>>,
        clock: Arc<dyn Clock>,
        config: &HealthMonitorConfig,
    ) -> Self {
        Self::new(schedulers, clock, config.log_threshold(), config.log_period())
    }

    /// Publish the longest unhealthy duration and a healthy flag to `sink`.
    /// The flag uses the log threshold.
    #[must_use]
    pub fn with_metrics(mut self, sink: &dyn MetricsSink) -> Self {
        self.metrics = Some(HealthMonitorMetrics::new(sink, self.logger.threshold()));
        self
    }

    /// Names of the watched schedulers.
    #[must_use]
    pub fn watched_names(&self) -> Vec<&str> {
        self.watched.iter().map(|w| w.scheduler.name()).collect()
    }

    /// Check every watched scheduler at `now`.
    ///
    /// Returns the longest unhealthy duration if it differs from the previous
    /// result, `Duration::ZERO` meaning everything just became healthy again.
    /// Returns `None` when nothing changed.
    pub fn check_system_health(&mut self, now: Instant) -> Option<Duration> {
        let mut longest = Duration::ZERO;

        for watched in &mut self.watched {
            let unprocessed = watched.scheduler.unprocessed_task_count();
            if unprocessed <= watched.capacity {
                watched.last_healthy = now;
                continue;
            }

            let dwell = now.saturating_duration_since(watched.last_healthy);
            self.logger.report(
                watched.scheduler.name(),
                unprocessed,
                watched.capacity,
                dwell,
                now,
            );
            longest = longest.max(dwell);
        }

        if let Some(metrics) = &self.metrics {
            metrics.update(longest);
        }

        if longest == self.previously_reported {
            return None;
        }
        self.previously_reported = longest;
        Some(longest)
    }

    /// Drive this monitor from a `period` heartbeat wire on `heartbeat`.
    ///
    /// Every changed result is forwarded on the returned wire.
    ///
    /// # Errors
    ///
    /// Fails like [`HeartbeatScheduler::build_heartbeat_wire`].
    pub fn bind_to_heartbeat(
        self,
        heartbeat: &HeartbeatScheduler,
        period: Duration,
    ) -> Result<OutputWire<Duration>, SchedulerError> {
        let beat = heartbeat.build_heartbeat_wire(period)?;
        let output = OutputWire::new(format!("{}_health", beat.name()));
        info!(
            heartbeat = heartbeat.name(),
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            watched = self.watched.len(),
            "Health monitor bound to heartbeat"
        );

        let monitor = Mutex::new(self);
        let changes = output.clone();
        beat.solder(move |_: SystemTime| {
            let changed = {
                let mut monitor = monitor.lock();
                let now = monitor.clock.now();
                monitor.check_system_health(now)
            };
            if let Some(longest) = changed {
                changes.forward(longest);
            }
        });
        Ok(output)
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("watched", &self.watched_names())
            .field("previously_reported", &self.previously_reported)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}
