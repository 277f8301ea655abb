//! Type-erased tasks and the fault boundary every task runs inside.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use super::counter::OffRampGuard;
use super::error::{AppResult, TaskFailure};

/// Callback receiving task failures: `(scheduler name, failure)`.
///
/// This is the uncaught-exception handler of a scheduler. It runs on the thread
/// that executed the failing task.
pub type FaultHandler = Arc<dyn Fn(&str, &TaskFailure) + Send + Sync>;

/// Fault handler used when the builder is not given one: logs at error level.
#[must_use]
pub fn logging_fault_handler() -> FaultHandler {
    Arc::new(|scheduler: &str, failure: &TaskFailure| {
        error!(scheduler = scheduler, error = %failure, "Uncaught failure in task handler");
    })
}

type Work = Box<dyn FnOnce() -> AppResult<()> + Send + 'static>;

/// A handler paired with its datum, ready to be admitted to a scheduler.
///
/// The weight is the number of capacity units the task costs while outstanding.
pub struct Task {
    weight: u64,
    work: Work,
}

impl Task {
    /// Task costing one capacity unit.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        Self::weighted(1, work)
    }

    /// Task costing `weight` capacity units.
    pub fn weighted<F>(weight: u64, work: F) -> Self
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        Self {
            weight,
            work: Box::new(work),
        }
    }

    /// Capacity units this task costs.
    #[must_use]
    pub const fn weight(&self) -> u64 {
        self.weight
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// A task that has passed admission and owns its off-ramp.
#[derive(Debug)]
pub(crate) struct AdmittedTask {
    task: Task,
    _permit: OffRampGuard,
}

impl AdmittedTask {
    pub(crate) const fn new(task: Task, permit: OffRampGuard) -> Self {
        Self {
            task,
            _permit: permit,
        }
    }

    /// Run the task inside the fault boundary.
    ///
    /// A handler error or panic is forwarded to `fault_handler` and never
    /// escapes. When `squelch` is set the handler is skipped entirely. The
    /// off-ramp happens when `self` drops at the end of this call, in all cases.
    pub(crate) fn run(self, scheduler: &str, squelch: bool, fault_handler: &FaultHandler) {
        if squelch {
            return;
        }
        let work = self.task.work;
        let failure = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(TaskFailure::Handler(e)),
            Err(payload) => Some(TaskFailure::Panicked(panic_message(payload.as_ref()))),
        };
        if let Some(failure) = failure {
            // The fault handler is user code too; a panic there must not kill the worker.
            let reported = panic::catch_unwind(AssertUnwindSafe(|| fault_handler(scheduler, &failure)));
            if reported.is_err() {
                error!(scheduler = scheduler, error = %failure, "Fault handler panicked while reporting failure");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
