//! Native implementation of the shared pool using OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel recv
//! - **Lock-free fast path**: submission is a channel send plus atomic counters
//! - **Clean shutdown**: dropping the sender unblocks workers naturally

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::error::SchedulerError;

use super::{Job, PoolCounters, PoolStats, Spawn};

/// How long `shutdown` waits for each worker before detaching it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Fixed-size pool of OS threads shared by concurrent schedulers.
///
/// # Design
///
/// - **No polling**: workers block on channel recv
/// - **Clean shutdown**: dropping the sender unblocks all workers
/// - **Panic isolation**: a panicking job never takes its worker down
pub struct WorkerPool {
    /// Pool configuration.
    config: WorkerPoolConfig,

    /// Job sender (to workers). Option allows clean shutdown by dropping.
    job_tx: Mutex<Option<Sender<Job>>>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    /// Shutdown flag (lock-free atomic).
    shutdown: AtomicBool,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new pool and spawn `config.worker_count` threads.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is invalid
    /// and `SchedulerError::Internal` if a thread cannot be spawned.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (job_tx, job_rx) = unbounded::<Job>();
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = spawn_worker(
                worker_id,
                &config,
                job_rx.clone(),
                Arc::clone(&counters),
            )?;
            workers.push(worker);
        }

        info!(
            worker_count = config.worker_count,
            thread_name_prefix = %config.thread_name_prefix,
            "WorkerPool initialized with dedicated OS threads"
        );

        Ok(Self {
            config,
            job_tx: Mutex::new(Some(job_tx)),
            counters,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
        })
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Shut down the pool gracefully.
    ///
    /// Jobs already queued still run. Each worker gets a bounded amount of time
    /// to exit; a worker that does not is detached to prevent hangs.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down worker pool");

        // Drop the sender; workers drain the channel, then recv() fails.
        self.job_tx.lock().take();

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            join_with_timeout(idx, worker, JOIN_TIMEOUT);
        }

        info!(worker_count = worker_count, "Worker pool shut down complete");
    }
}

impl Spawn for WorkerPool {
    fn spawn(&self, job: Job) -> Result<(), SchedulerError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::PoolShutdown);
        }

        let job_tx = self.job_tx.lock();
        let Some(job_tx) = job_tx.as_ref() else {
            return Err(SchedulerError::PoolShutdown);
        };

        // Count before sending so a fast worker never decrements below zero.
        self.counters.queued_jobs.fetch_add(1, Ordering::Relaxed);
        if job_tx.send(job).is_err() {
            self.counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
            return Err(SchedulerError::PoolShutdown);
        }
        self.counters.submitted_jobs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn parallelism(&self) -> usize {
        self.config.worker_count
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join workers in Drop.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.job_tx.lock().take();
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// Join `worker` on a helper thread, giving up after `timeout`.
pub(crate) fn join_with_timeout(idx: usize, worker: JoinHandle<()>, timeout: Duration) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let joiner = thread::spawn(move || {
        let result = worker.join();
        let _ = tx.send(result.is_ok());
    });

    match rx.recv_timeout(timeout) {
        Ok(true) => {
            debug!(worker_id = idx, "Worker joined successfully");
            let _ = joiner.join();
        }
        Ok(false) => {
            warn!(worker_id = idx, "Worker panicked");
            let _ = joiner.join();
        }
        Err(_) => {
            // The joiner thread stays parked on the worker; both exit eventually.
            warn!(worker_id = idx, "Worker did not exit within timeout - detaching");
        }
    }
}

fn spawn_worker(
    worker_id: usize,
    config: &WorkerPoolConfig,
    job_rx: Receiver<Job>,
    counters: Arc<PoolCounters>,
) -> Result<JoinHandle<()>, SchedulerError> {
    thread::Builder::new()
        .name(format!("{}-{worker_id}", config.thread_name_prefix))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Worker thread started");

            // Blocks until a job arrives; returns Err once the sender is dropped
            // and the channel is drained.
            while let Ok(job) = job_rx.recv() {
                counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                counters.active_jobs.fetch_add(1, Ordering::Relaxed);

                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(worker_id = worker_id, "Job panicked on pool worker");
                }

                counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
                counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
            }

            debug!(worker_id = worker_id, "Worker thread exiting");
        })
        .map_err(|e| SchedulerError::Internal(format!("failed to spawn pool worker: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        done()
    }

    #[test]
    fn test_worker_pool_runs_jobs() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(2)).unwrap();
        let executed = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let executed = Arc::clone(&executed);
            pool.spawn(Box::new(move || {
                executed.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }

        assert!(wait_for(Duration::from_secs(5), || executed.load(Ordering::SeqCst) == 10));
        assert!(wait_for(Duration::from_secs(5), || pool.stats().completed_jobs == 10));
        assert_eq!(pool.stats().submitted_jobs, 10);
        assert_eq!(pool.parallelism(), 2);
        pool.shutdown();
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(1)).unwrap();
        let executed = Arc::new(AtomicUsize::new(0));

        pool.spawn(Box::new(|| panic!("intentional"))).unwrap();
        let counter = Arc::clone(&executed);
        pool.spawn(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        assert!(wait_for(Duration::from_secs(5), || executed.load(Ordering::SeqCst) == 1));
        pool.shutdown();
    }

    #[test]
    fn test_spawn_after_shutdown_fails() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(1)).unwrap();
        pool.shutdown();
        let result = pool.spawn(Box::new(|| {}));
        assert!(matches!(result, Err(SchedulerError::PoolShutdown)));
    }
}
