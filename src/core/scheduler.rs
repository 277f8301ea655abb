//! The scheduler contract shared by every concurrency strategy.
//!
//! A scheduler is seen through two capability sets:
//!
//! - [`SchedulerIntrospect`]: name, type, capacity and outstanding work. This is
//!   all the health monitor ever reads.
//! - [`TaskScheduler`]: admission (`put`/`offer`/`inject`), `flush`, squelching
//!   and lifecycle.
//!
//! Strategies share their bookkeeping through [`SchedulerCore`] rather than a
//! base class.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::counter::{ObjectCounter, OffRampGuard};
use super::error::SchedulerError;
use super::task::{AdmittedTask, FaultHandler, Task};

/// Concurrency strategy of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerType {
    /// Tasks run on a shared parallel pool in no particular order.
    Concurrent,
    /// Tasks run one at a time, in admission order, on a dedicated thread.
    SequentialThread,
    /// Tasks run on the admitting thread.
    Direct,
    /// Pure source emitting timestamps; accepts no tasks.
    Heartbeat,
}

impl fmt::Display for SchedulerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Concurrent => "concurrent",
            Self::SequentialThread => "sequential_thread",
            Self::Direct => "direct",
            Self::Heartbeat => "heartbeat",
        };
        f.write_str(name)
    }
}

/// Soft limit on outstanding work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    /// At most this many outstanding units before the scheduler is unhealthy.
    Bounded(u64),
    /// No limit. Unlimited schedulers are never health-monitored.
    Unlimited,
}

impl Capacity {
    /// The numeric limit, if bounded.
    #[must_use]
    pub const fn limit(self) -> Option<u64> {
        match self {
            Self::Bounded(limit) => Some(limit),
            Self::Unlimited => None,
        }
    }
}

/// Read-only view of a scheduler.
pub trait SchedulerIntrospect: Send + Sync {
    /// Unique name within the registry.
    fn name(&self) -> &str;

    /// Concurrency strategy.
    fn scheduler_type(&self) -> SchedulerType;

    /// Configured capacity. Immutable after construction.
    fn capacity(&self) -> Capacity;

    /// Admitted units not yet completed, including in-flight work.
    fn unprocessed_task_count(&self) -> u64;
}

/// Admission, flushing and lifecycle of a task-accepting scheduler.
pub trait TaskScheduler: SchedulerIntrospect {
    /// Admit a task. Blocks while over capacity if insertion is blocking,
    /// otherwise admits immediately. The task is always eventually dispatched.
    fn put(&self, task: Task);

    /// Admit a task only if capacity allows. Never blocks.
    fn offer(&self, task: Task) -> bool;

    /// Admit a task regardless of capacity. Never blocks.
    ///
    /// Reserved for control-plane signals that must bypass backpressure.
    fn inject(&self, task: Task);

    /// Block until every admitted task has completed.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::FlushDisabled`] if the scheduler was built
    /// without flushing.
    fn flush(&self) -> Result<(), SchedulerError>;

    /// Start accepting tasks without invoking their handlers.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::SquelchingDisabled`] if squelching was not enabled.
    fn start_squelching(&self) -> Result<(), SchedulerError>;

    /// Resume invoking handlers.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::SquelchingDisabled`] if squelching was not enabled.
    fn stop_squelching(&self) -> Result<(), SchedulerError>;

    /// Whether handlers are currently being skipped.
    fn is_squelching(&self) -> bool;

    /// Start any threads owned by this scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyStarted`] on a second call for threaded
    /// schedulers.
    fn start(&self) -> Result<(), SchedulerError> {
        Ok(())
    }

    /// Stop any threads owned by this scheduler. In-flight tasks are not aborted.
    fn stop(&self) {}
}

/// Settings fixed at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Unique name.
    pub name: String,
    /// Soft limit on outstanding units.
    pub capacity: Capacity,
    /// Whether `flush` is allowed.
    pub flush_enabled: bool,
    /// Whether squelching may be toggled.
    pub squelching_enabled: bool,
    /// Whether `put` blocks while over capacity.
    pub insertion_is_blocking: bool,
}

/// Bookkeeping shared by all strategies: settings, counters, squelch flag and
/// fault handler.
///
/// Admission always on-ramps the on-ramp counter and hands back an
/// [`AdmittedTask`] that off-ramps the off-ramp counter when dropped. Both are
/// the same counter unless the builder was given external ones.
pub struct SchedulerCore {
    settings: SchedulerSettings,
    on_ramp: Arc<dyn ObjectCounter>,
    off_ramp: Arc<dyn ObjectCounter>,
    squelching: AtomicBool,
    fault_handler: FaultHandler,
}

impl SchedulerCore {
    /// Assemble the shared state.
    #[must_use]
    pub fn new(
        settings: SchedulerSettings,
        on_ramp: Arc<dyn ObjectCounter>,
        off_ramp: Arc<dyn ObjectCounter>,
        fault_handler: FaultHandler,
    ) -> Self {
        Self {
            settings,
            on_ramp,
            off_ramp,
            squelching: AtomicBool::new(false),
            fault_handler,
        }
    }

    /// Construction-time settings.
    #[must_use]
    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Scheduler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Outstanding units according to the on-ramp counter.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.on_ramp.count()
    }

    fn permit(&self, task: Task) -> AdmittedTask {
        let permit = OffRampGuard::new(Arc::clone(&self.off_ramp), task.weight());
        AdmittedTask::new(task, permit)
    }

    pub(crate) fn admit_put(&self, task: Task) -> AdmittedTask {
        if self.settings.insertion_is_blocking {
            self.on_ramp.on_ramp(task.weight());
        } else {
            self.on_ramp.force_on_ramp(task.weight());
        }
        self.permit(task)
    }

    pub(crate) fn admit_offer(&self, task: Task) -> Option<AdmittedTask> {
        if self.on_ramp.attempt_on_ramp(task.weight()) {
            Some(self.permit(task))
        } else {
            debug!(scheduler = self.name(), weight = task.weight(), "Offer rejected at capacity");
            None
        }
    }

    pub(crate) fn admit_inject(&self, task: Task) -> AdmittedTask {
        self.on_ramp.force_on_ramp(task.weight());
        self.permit(task)
    }

    /// Run an admitted task inside the fault boundary, honouring squelching.
    pub(crate) fn execute(&self, task: AdmittedTask) {
        task.run(self.name(), self.is_squelching(), &self.fault_handler);
    }

    pub(crate) fn flush(&self) -> Result<(), SchedulerError> {
        if !self.settings.flush_enabled {
            return Err(SchedulerError::FlushDisabled(self.settings.name.clone()));
        }
        self.on_ramp.wait_until_empty();
        Ok(())
    }

    pub(crate) fn set_squelching(&self, squelch: bool) -> Result<(), SchedulerError> {
        if !self.settings.squelching_enabled {
            return Err(SchedulerError::SquelchingDisabled(self.settings.name.clone()));
        }
        self.squelching.store(squelch, Ordering::Release);
        debug!(scheduler = self.name(), squelch = squelch, "Squelching toggled");
        Ok(())
    }

    pub(crate) fn is_squelching(&self) -> bool {
        self.squelching.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SchedulerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerCore")
            .field("settings", &self.settings)
            .field("count", &self.count())
            .field("squelching", &self.is_squelching())
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a scheduler, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Scheduler name.
    pub name: String,
    /// Concurrency strategy.
    pub scheduler_type: SchedulerType,
    /// Configured capacity.
    pub capacity: Capacity,
    /// Outstanding units at snapshot time.
    pub unprocessed_task_count: u64,
}

impl SchedulerSnapshot {
    /// Capture the current state of `scheduler`.
    pub fn of(scheduler: &dyn SchedulerIntrospect) -> Self {
        Self {
            name: scheduler.name().to_string(),
            scheduler_type: scheduler.scheduler_type(),
            capacity: scheduler.capacity(),
            unprocessed_task_count: scheduler.unprocessed_task_count(),
        }
    }
}
