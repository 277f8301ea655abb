//! Name-keyed collection of every scheduler in a wiring model.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::scheduler_builder::validate_name;
use crate::config::HealthMonitorConfig;
use crate::core::{
    HeartbeatScheduler, SchedulerError, SchedulerIntrospect, SchedulerSnapshot, TaskScheduler,
};
use crate::health::HealthMonitor;
use crate::util::Clock;

#[derive(Clone)]
enum Entry {
    Tasks(Arc<dyn TaskScheduler>),
    Heartbeat(Arc<HeartbeatScheduler>),
}

impl Entry {
    fn introspect(&self) -> Arc<dyn SchedulerIntrospect> {
        match self {
            Self::Tasks(scheduler) => Arc::clone(scheduler) as Arc<dyn SchedulerIntrospect>,
            Self::Heartbeat(heartbeat) => Arc::clone(heartbeat) as Arc<dyn SchedulerIntrospect>,
        }
    }
}

/// Schedulers registered under unique names.
#[derive(Default)]
pub struct SchedulerRegistry {
    entries: BTreeMap<String, Entry>,
}

impl SchedulerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: &str, entry: Entry) -> Result<(), SchedulerError> {
        validate_name(name)?;
        if self.entries.contains_key(name) {
            return Err(SchedulerError::DuplicateName(name.to_string()));
        }
        self.entries.insert(name.to_string(), entry);
        Ok(())
    }

    /// Register a task scheduler under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DuplicateName`] if the name is taken.
    pub fn register(&mut self, scheduler: Arc<dyn TaskScheduler>) -> Result<(), SchedulerError> {
        let name = scheduler.name().to_string();
        self.insert(&name, Entry::Tasks(scheduler))
    }

    /// Register a heartbeat scheduler under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DuplicateName`] if the name is taken.
    pub fn register_heartbeat(
        &mut self,
        heartbeat: Arc<HeartbeatScheduler>,
    ) -> Result<(), SchedulerError> {
        let name = heartbeat.name().to_string();
        self.insert(&name, Entry::Heartbeat(heartbeat))
    }

    /// Task scheduler registered as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskScheduler>> {
        match self.entries.get(name)? {
            Entry::Tasks(scheduler) => Some(Arc::clone(scheduler)),
            Entry::Heartbeat(_) => None,
        }
    }

    /// Heartbeat scheduler registered as `name`.
    #[must_use]
    pub fn heartbeat(&self, name: &str) -> Option<Arc<HeartbeatScheduler>> {
        match self.entries.get(name)? {
            Entry::Heartbeat(heartbeat) => Some(Arc::clone(heartbeat)),
            Entry::Tasks(_) => None,
        }
    }

    /// Number of registered schedulers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every scheduler, ordered by name.
    #[must_use]
    pub fn snapshots(&self) -> Vec<SchedulerSnapshot> {
        self.entries
            .values()
            .map(|entry| SchedulerSnapshot::of(entry.introspect().as_ref()))
            .collect()
    }

    /// Start every scheduler, task schedulers first so heartbeats never tick
    /// into a stopped worker.
    ///
    /// # Errors
    ///
    /// Returns the first start failure; schedulers already started stay running.
    pub fn start_all(&self) -> Result<(), SchedulerError> {
        for entry in self.entries.values() {
            if let Entry::Tasks(scheduler) = entry {
                scheduler.start()?;
            }
        }
        for entry in self.entries.values() {
            if let Entry::Heartbeat(heartbeat) = entry {
                heartbeat.start()?;
            }
        }
        info!(schedulers = self.entries.len(), "All schedulers started");
        Ok(())
    }

    /// Stop heartbeats, then every task scheduler.
    ///
    /// Heartbeats that were never started or are already stopped are skipped.
    pub fn stop_all(&self) {
        for entry in self.entries.values() {
            if let Entry::Heartbeat(heartbeat) = entry {
                let _ = heartbeat.stop();
            }
        }
        for entry in self.entries.values() {
            if let Entry::Tasks(scheduler) = entry {
                scheduler.stop();
            }
        }
        info!(schedulers = self.entries.len(), "All schedulers stopped");
    }

    /// Health monitor over every registered scheduler.
    #[must_use]
    pub fn health_monitor(&self, clock: Arc<dyn Clock>, config: &HealthMonitorConfig) -> HealthMonitor {
        let schedulers = self.entries.values().map(Entry::introspect).collect();
        HealthMonitor::from_config(schedulers, clock, config)
    }
}

impl std::fmt::Debug for SchedulerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerRegistry")
            .field("schedulers", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
