//! Shared parallel execution pool for concurrent schedulers.
//!
//! Concurrent schedulers never own threads. They hand admitted work to a
//! [`Spawn`] implementation shared by every concurrent scheduler in the process.
//! The default is [`WorkerPool`], a fixed set of OS threads pulling jobs from
//! one unbounded channel; `runtime::TokioSpawner` adapts a tokio runtime.
//!
//! # Key Features
//!
//! - **No ordering**: jobs run on whichever worker is free
//! - **No polling**: idle workers block on the channel
//! - **Clean shutdown**: dropping the sender unblocks every worker
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_wiring::config::WorkerPoolConfig;
//! use prometheus_wiring::core::{Spawn, WorkerPool};
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(4))?;
//! pool.spawn(Box::new(|| println!("hello from the pool")))?;
//! pool.shutdown();
//! ```

mod native;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::error::SchedulerError;

pub use native::WorkerPool;
pub(crate) use native::join_with_timeout;

/// A unit of work handed to a pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Abstraction for running jobs on a shared parallel pool.
pub trait Spawn: Send + Sync {
    /// Run `job` at some point on some pool thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PoolShutdown`] if the pool no longer accepts
    /// work. The job is dropped unexecuted in that case.
    fn spawn(&self, job: Job) -> Result<(), SchedulerError>;

    /// Number of jobs that may run at the same time.
    fn parallelism(&self) -> usize;
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Currently executing jobs.
    pub active_jobs: u64,
    /// Jobs waiting in the channel.
    pub queued_jobs: u64,
    /// Total jobs submitted.
    pub submitted_jobs: u64,
    /// Total jobs finished (including those whose closure panicked).
    pub completed_jobs: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_jobs: AtomicU64,
    pub queued_jobs: AtomicU64,
    pub submitted_jobs: AtomicU64,
    pub completed_jobs: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            submitted_jobs: self.submitted_jobs.load(Ordering::Relaxed),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
        }
    }
}
