//! Scheduler and health monitor configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::pool::WorkerPoolConfig;
use crate::core::{Capacity, SchedulerType};

/// Environment variable overriding the health log threshold (milliseconds).
pub const ENV_HEALTH_LOG_THRESHOLD_MS: &str = "WIRING_HEALTH_LOG_THRESHOLD_MS";
/// Environment variable overriding the health log period (milliseconds).
pub const ENV_HEALTH_LOG_PERIOD_MS: &str = "WIRING_HEALTH_LOG_PERIOD_MS";
/// Environment variable overriding the health check heartbeat period (milliseconds).
pub const ENV_HEALTH_HEARTBEAT_PERIOD_MS: &str = "WIRING_HEALTH_HEARTBEAT_PERIOD_MS";

/// Configuration of one scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrency strategy.
    #[serde(rename = "type")]
    pub scheduler_type: SchedulerType,
    /// Maximum outstanding units; `None` means unlimited.
    #[serde(default)]
    pub unhandled_task_capacity: Option<u64>,
    /// Whether `flush` is allowed.
    #[serde(default)]
    pub flush_enabled: bool,
    /// Whether squelching may be toggled.
    #[serde(default)]
    pub squelching_enabled: bool,
    /// Whether `put` blocks while over capacity.
    #[serde(default = "default_true")]
    pub insertion_is_blocking: bool,
}

const fn default_true() -> bool {
    true
}

impl SchedulerConfig {
    /// Configuration with the given type, unlimited capacity and defaults elsewhere.
    #[must_use]
    pub const fn new(scheduler_type: SchedulerType) -> Self {
        Self {
            scheduler_type,
            unhandled_task_capacity: None,
            flush_enabled: false,
            squelching_enabled: false,
            insertion_is_blocking: true,
        }
    }

    /// Capacity described by this configuration.
    #[must_use]
    pub const fn capacity(&self) -> Capacity {
        match self.unhandled_task_capacity {
            Some(limit) => Capacity::Bounded(limit),
            None => Capacity::Unlimited,
        }
    }

    /// Validate scheduler configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler_type == SchedulerType::Heartbeat {
            return Err("heartbeat schedulers are built with HeartbeatScheduler::new".into());
        }
        if self.unhandled_task_capacity == Some(0) {
            return Err("unhandled_task_capacity must be greater than 0".into());
        }
        Ok(())
    }
}

/// Health monitor tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthMonitorConfig {
    /// Dwell time over capacity before warnings are logged and the process is
    /// reported unhealthy.
    pub log_threshold_ms: u64,
    /// Minimum time between two warnings for the same scheduler.
    pub log_period_ms: u64,
    /// How often the monitor is driven by its heartbeat.
    pub heartbeat_period_ms: u64,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            log_threshold_ms: 5_000,
            log_period_ms: 600_000,
            heartbeat_period_ms: 100,
        }
    }
}

impl HealthMonitorConfig {
    /// Dwell-time threshold.
    #[must_use]
    pub const fn log_threshold(&self) -> Duration {
        Duration::from_millis(self.log_threshold_ms)
    }

    /// Minimum interval between per-scheduler warnings.
    #[must_use]
    pub const fn log_period(&self) -> Duration {
        Duration::from_millis(self.log_period_ms)
    }

    /// Heartbeat period driving the monitor.
    #[must_use]
    pub const fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms)
    }

    /// Load overrides from the environment (and a `.env` file if present),
    /// falling back to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns a description if a variable is set but not a valid integer, or
    /// if the resulting configuration is invalid.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is fine; only the process environment matters then.
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(value) = read_env_ms(ENV_HEALTH_LOG_THRESHOLD_MS)? {
            cfg.log_threshold_ms = value;
        }
        if let Some(value) = read_env_ms(ENV_HEALTH_LOG_PERIOD_MS)? {
            cfg.log_period_ms = value;
        }
        if let Some(value) = read_env_ms(ENV_HEALTH_HEARTBEAT_PERIOD_MS)? {
            cfg.heartbeat_period_ms = value;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate health monitor values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_period_ms == 0 {
            return Err("heartbeat_period_ms must be at least 1".into());
        }
        Ok(())
    }
}

fn read_env_ms(key: &str) -> Result<Option<u64>, String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| format!("{key}=`{raw}` is not a valid millisecond value: {e}")),
        Err(_) => Ok(None),
    }
}

/// Root configuration: the shared pool, every scheduler, and the health monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringConfig {
    /// Shared pool for concurrent schedulers.
    #[serde(default)]
    pub pool: WorkerPoolConfig,
    /// Map of scheduler name to configuration.
    pub schedulers: HashMap<String, SchedulerConfig>,
    /// Health monitor tuning.
    #[serde(default)]
    pub health: HealthMonitorConfig,
}

impl WiringConfig {
    /// Validate all sections and ensure at least one scheduler exists.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.schedulers.is_empty() {
            return Err("at least one scheduler must be defined".into());
        }
        self.pool.validate().map_err(|e| format!("pool invalid: {e}"))?;
        self.health.validate().map_err(|e| format!("health invalid: {e}"))?;
        for (name, scheduler) in &self.schedulers {
            scheduler
                .validate()
                .map_err(|e| format!("scheduler `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
