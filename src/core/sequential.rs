//! Scheduler that runs tasks one at a time, in admission order, on a dedicated
//! thread.
//!
//! # Design
//!
//! - **Unbounded FIFO**: capacity is enforced at admission through the counter,
//!   so the queue itself never rejects or blocks
//! - **Weighted**: each task off-ramps exactly the weight it was admitted with
//! - **Batched drain**: the worker takes up to [`BATCH_SIZE`] tasks at once and
//!   only re-checks its alive flag between batches
//! - **No busy-spin**: an empty queue is waited on with a [`POLL_TIMEOUT`]
//!
//! # Lifecycle
//!
//! `Created → Running → Stopping → Stopped`. Tasks admitted before `start()`
//! queue up and run once the worker starts. `stop()` lets the current batch
//! finish; nothing in flight is aborted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::SchedulerError;
use super::scheduler::{Capacity, SchedulerCore, SchedulerIntrospect, SchedulerType, TaskScheduler};
use super::task::{AdmittedTask, Task};
use super::worker_pool::join_with_timeout;
use crate::metrics::FractionGauge;
use crate::util::BusyTimer;

/// Maximum number of tasks drained from the queue per iteration.
pub const BATCH_SIZE: usize = 100;

/// How long the worker waits on an empty queue before re-checking its alive flag.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// How often the worker publishes its busy fraction when a gauge is attached.
pub const BUSY_SAMPLE_PERIOD: Duration = Duration::from_millis(100);

/// How long `stop()` waits for the worker thread to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Built, worker not yet spawned.
    Created,
    /// Worker thread is processing tasks.
    Running,
    /// Stop requested; the worker is finishing its batch.
    Stopping,
    /// Worker thread has exited (or was detached after the stop timeout).
    Stopped,
}

/// State shared between the scheduler handle and its worker thread.
struct Shared {
    core: SchedulerCore,
    alive: AtomicBool,
    busy: BusyTimer,
}

/// Scheduler with one dedicated worker thread and strict FIFO execution.
pub struct SequentialThreadTaskScheduler {
    shared: Arc<Shared>,
    queue_tx: Sender<AdmittedTask>,
    queue_rx: Receiver<AdmittedTask>,
    state: Mutex<WorkerState>,
    worker: Mutex<Option<JoinHandle<()>>>,
    busy_gauge: Option<Arc<FractionGauge>>,
}

impl SequentialThreadTaskScheduler {
    /// Create a scheduler. The worker thread is spawned by [`TaskScheduler::start`].
    #[must_use]
    pub fn new(core: SchedulerCore) -> Self {
        let (queue_tx, queue_rx) = unbounded();
        Self {
            shared: Arc::new(Shared {
                core,
                alive: AtomicBool::new(false),
                busy: BusyTimer::new(),
            }),
            queue_tx,
            queue_rx,
            state: Mutex::new(WorkerState::Created),
            worker: Mutex::new(None),
            busy_gauge: None,
        }
    }

    /// Publish the worker's busy fraction to `gauge` every [`BUSY_SAMPLE_PERIOD`].
    #[must_use]
    pub fn with_busy_gauge(mut self, gauge: Arc<FractionGauge>) -> Self {
        self.busy_gauge = Some(gauge);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Fraction of the current measurement window the worker spent handling
    /// tasks. The window restarts at every published sample.
    #[must_use]
    pub fn busy_fraction(&self) -> f64 {
        self.shared.busy.busy_fraction()
    }

    fn enqueue(&self, task: AdmittedTask) {
        // The scheduler holds a receiver, so the channel can never be disconnected
        // while `self` is alive.
        if self.queue_tx.send(task).is_err() {
            warn!(scheduler = self.shared.core.name(), "Task queue disconnected");
        }
    }
}

impl SchedulerIntrospect for SequentialThreadTaskScheduler {
    fn name(&self) -> &str {
        self.shared.core.name()
    }

    fn scheduler_type(&self) -> SchedulerType {
        SchedulerType::SequentialThread
    }

    fn capacity(&self) -> Capacity {
        self.shared.core.settings().capacity
    }

    fn unprocessed_task_count(&self) -> u64 {
        self.shared.core.count()
    }
}

impl TaskScheduler for SequentialThreadTaskScheduler {
    fn put(&self, task: Task) {
        let task = self.shared.core.admit_put(task);
        self.enqueue(task);
    }

    fn offer(&self, task: Task) -> bool {
        match self.shared.core.admit_offer(task) {
            Some(task) => {
                self.enqueue(task);
                true
            }
            None => false,
        }
    }

    fn inject(&self, task: Task) {
        let task = self.shared.core.admit_inject(task);
        self.enqueue(task);
    }

    fn flush(&self) -> Result<(), SchedulerError> {
        self.shared.core.flush()
    }

    fn start_squelching(&self) -> Result<(), SchedulerError> {
        self.shared.core.set_squelching(true)
    }

    fn stop_squelching(&self) -> Result<(), SchedulerError> {
        self.shared.core.set_squelching(false)
    }

    fn is_squelching(&self) -> bool {
        self.shared.core.is_squelching()
    }

    fn start(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if *state != WorkerState::Created {
            return Err(SchedulerError::AlreadyStarted(self.name().to_string()));
        }

        self.shared.alive.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let queue_rx = self.queue_rx.clone();
        let busy_gauge = self.busy_gauge.clone();
        let handle = thread::Builder::new()
            .name(format!("wiring-{}", self.name()))
            .spawn(move || worker_loop(&shared, &queue_rx, busy_gauge.as_deref()))
            .map_err(|e| {
                self.shared.alive.store(false, Ordering::Release);
                SchedulerError::Internal(format!("failed to spawn worker for `{}`: {e}", self.name()))
            })?;

        *self.worker.lock() = Some(handle);
        *state = WorkerState::Running;
        info!(scheduler = self.name(), "Sequential scheduler started");
        Ok(())
    }

    fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state != WorkerState::Running {
                return;
            }
            *state = WorkerState::Stopping;
        }

        self.shared.alive.store(false, Ordering::Release);
        if let Some(worker) = self.worker.lock().take() {
            join_with_timeout(0, worker, STOP_TIMEOUT);
        }

        *self.state.lock() = WorkerState::Stopped;
        info!(
            scheduler = self.name(),
            unprocessed = self.unprocessed_task_count(),
            "Sequential scheduler stopped"
        );
    }
}

impl Drop for SequentialThreadTaskScheduler {
    fn drop(&mut self) {
        // Let the worker exit on its next wake-up; don't join in Drop.
        self.shared.alive.store(false, Ordering::Release);
    }
}

impl fmt::Debug for SequentialThreadTaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialThreadTaskScheduler")
            .field("core", &self.shared.core)
            .field("state", &self.state())
            .field("queued", &self.queue_rx.len())
            .finish_non_exhaustive()
    }
}

fn worker_loop(
    shared: &Shared,
    queue_rx: &Receiver<AdmittedTask>,
    busy_gauge: Option<&FractionGauge>,
) {
    let name = shared.core.name();
    debug!(scheduler = name, "Sequential worker started");

    let mut last_sample = Instant::now();
    if busy_gauge.is_some() {
        shared.busy.take_busy_fraction();
    }

    let mut batch = Vec::with_capacity(BATCH_SIZE);
    while shared.alive.load(Ordering::Acquire) {
        if let Some(gauge) = busy_gauge {
            if last_sample.elapsed() >= BUSY_SAMPLE_PERIOD {
                gauge.set(shared.busy.take_busy_fraction());
                last_sample = Instant::now();
            }
        }

        while batch.len() < BATCH_SIZE {
            match queue_rx.try_recv() {
                Ok(task) => batch.push(task),
                Err(_) => break,
            }
        }

        if batch.is_empty() {
            match queue_rx.recv_timeout(POLL_TIMEOUT) {
                Ok(task) => batch.push(task),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for task in batch.drain(..) {
            shared.busy.activate();
            shared.core.execute(task);
            shared.busy.deactivate();
        }
    }

    debug!(scheduler = name, "Sequential worker exiting");
}
