//! Scheduler that dispatches tasks onto a shared parallel pool.
//!
//! Capacity here is admission control only: it bounds how much work may be
//! outstanding, not how many tasks run at once. Completion order is unspecified.

use std::sync::Arc;

use tracing::warn;

use super::error::SchedulerError;
use super::scheduler::{Capacity, SchedulerCore, SchedulerIntrospect, SchedulerType, TaskScheduler};
use super::task::{AdmittedTask, Task};
use super::worker_pool::Spawn;

/// Scheduler backed by a shared [`Spawn`] pool.
pub struct ConcurrentTaskScheduler {
    core: Arc<SchedulerCore>,
    pool: Arc<dyn Spawn>,
}

impl ConcurrentTaskScheduler {
    /// Create a scheduler submitting to `pool`.
    #[must_use]
    pub fn new(core: SchedulerCore, pool: Arc<dyn Spawn>) -> Self {
        Self {
            core: Arc::new(core),
            pool,
        }
    }

    fn submit(&self, task: AdmittedTask) {
        let core = Arc::clone(&self.core);
        let job = Box::new(move || core.execute(task));
        if let Err(e) = self.pool.spawn(job) {
            // The rejected job was dropped, which already off-ramped its units.
            warn!(scheduler = self.core.name(), error = %e, "Task discarded by shared pool");
        }
    }
}

impl SchedulerIntrospect for ConcurrentTaskScheduler {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn scheduler_type(&self) -> SchedulerType {
        SchedulerType::Concurrent
    }

    fn capacity(&self) -> Capacity {
        self.core.settings().capacity
    }

    fn unprocessed_task_count(&self) -> u64 {
        self.core.count()
    }
}

impl TaskScheduler for ConcurrentTaskScheduler {
    fn put(&self, task: Task) {
        let task = self.core.admit_put(task);
        self.submit(task);
    }

    fn offer(&self, task: Task) -> bool {
        match self.core.admit_offer(task) {
            Some(task) => {
                self.submit(task);
                true
            }
            None => false,
        }
    }

    fn inject(&self, task: Task) {
        let task = self.core.admit_inject(task);
        self.submit(task);
    }

    fn flush(&self) -> Result<(), SchedulerError> {
        self.core.flush()
    }

    fn start_squelching(&self) -> Result<(), SchedulerError> {
        self.core.set_squelching(true)
    }

    fn stop_squelching(&self) -> Result<(), SchedulerError> {
        self.core.set_squelching(false)
    }

    fn is_squelching(&self) -> bool {
        self.core.is_squelching()
    }
}

impl std::fmt::Debug for ConcurrentTaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentTaskScheduler")
            .field("core", &self.core)
            .field("parallelism", &self.pool.parallelism())
            .finish()
    }
}
