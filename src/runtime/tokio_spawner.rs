//! Tokio runtime spawner implementation.

use std::fmt;
use std::sync::Arc;

use crate::core::{Job, SchedulerError, Spawn};

/// Shared pool backed by a tokio runtime's blocking thread pool.
///
/// Jobs are synchronous handlers, so they go through `spawn_blocking` and never
/// stall the runtime's async workers.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
    // Keeps an owned runtime alive for as long as any clone of the spawner.
    owned: Option<Arc<tokio::runtime::Runtime>>,
}

impl TokioSpawner {
    /// Spawner on an existing runtime.
    #[must_use]
    pub const fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }

    /// Spawner on a new multi-threaded runtime it owns.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the runtime cannot be built.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("wiring-tokio")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(Arc::new(runtime)),
        })
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, job: Job) -> Result<(), SchedulerError> {
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }

    fn parallelism(&self) -> usize {
        self.handle.metrics().num_workers()
    }
}

impl fmt::Debug for TokioSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioSpawner")
            .field("owns_runtime", &self.owned.is_some())
            .finish_non_exhaustive()
    }
}
