//! Error types for scheduler operations.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by scheduler components.
///
/// Every variant is a programmer or configuration error: callers are expected to
/// fail fast rather than retry.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler name contains characters other than ASCII letters, digits and `_`.
    #[error("invalid scheduler name: `{0}`")]
    InvalidName(String),
    /// A scheduler with this name is already registered.
    #[error("duplicate scheduler name: `{0}`")]
    DuplicateName(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `flush()` was called on a scheduler built without flushing.
    #[error("flushing is not enabled for scheduler `{0}`")]
    FlushDisabled(String),
    /// Squelching was toggled on a scheduler built without squelching.
    #[error("squelching is not enabled for scheduler `{0}`")]
    SquelchingDisabled(String),
    /// Heartbeat period below the one millisecond minimum.
    #[error("heartbeat period {0:?} is below the 1ms minimum")]
    InvalidPeriod(Duration),
    /// Heartbeat frequency is not positive or maps to a sub-millisecond period.
    #[error("invalid heartbeat frequency: {0} hz")]
    InvalidFrequency(f64),
    /// The component was already started.
    #[error("`{0}` has already been started")]
    AlreadyStarted(String),
    /// The component has not been started yet.
    #[error("`{0}` has not been started")]
    NotStarted(String),
    /// The component was already stopped.
    #[error("`{0}` has already been stopped")]
    AlreadyStopped(String),
    /// The shared execution pool has been shut down.
    #[error("execution pool has been shut down")]
    PoolShutdown,
    /// Internal failure (thread spawn, channel closed, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure captured at the fault boundary around a task handler.
#[derive(Debug, Error)]
pub enum TaskFailure {
    /// The handler returned an error.
    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),
    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Application-facing result using anyhow for handler code.
pub type AppResult<T> = Result<T, anyhow::Error>;
