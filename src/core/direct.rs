//! Scheduler that runs each task on the thread that admits it.

use super::error::SchedulerError;
use super::scheduler::{Capacity, SchedulerCore, SchedulerIntrospect, SchedulerType, TaskScheduler};
use super::task::Task;

/// Runs the handler synchronously inside `put`/`offer`/`inject`.
///
/// Work never queues, so the unprocessed count only reflects handlers that are
/// running right now on some admitting thread. Useful for cheap transformations
/// where a hop to another thread costs more than the work itself.
#[derive(Debug)]
pub struct DirectTaskScheduler {
    core: SchedulerCore,
}

impl DirectTaskScheduler {
    /// Create a direct scheduler.
    #[must_use]
    pub const fn new(core: SchedulerCore) -> Self {
        Self { core }
    }
}

impl SchedulerIntrospect for DirectTaskScheduler {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn scheduler_type(&self) -> SchedulerType {
        SchedulerType::Direct
    }

    fn capacity(&self) -> Capacity {
        self.core.settings().capacity
    }

    fn unprocessed_task_count(&self) -> u64 {
        self.core.count()
    }
}

impl TaskScheduler for DirectTaskScheduler {
    fn put(&self, task: Task) {
        let task = self.core.admit_put(task);
        self.core.execute(task);
    }

    fn offer(&self, task: Task) -> bool {
        let Some(task) = self.core.admit_offer(task) else {
            return false;
        };
        self.core.execute(task);
        true
    }

    fn inject(&self, task: Task) {
        let task = self.core.admit_inject(task);
        self.core.execute(task);
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
