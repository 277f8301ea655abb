//! Core scheduling abstractions and capacity accounting.

pub mod concurrent;
pub mod counter;
pub mod direct;
pub mod error;
pub mod heartbeat;
pub mod scheduler;
pub mod sequential;
pub mod task;
pub mod wire;
pub mod worker_pool;

pub use concurrent::ConcurrentTaskScheduler;
pub use counter::{
    BackpressureObjectCounter, MultiObjectCounter, ObjectCounter, OffRampGuard,
    StandardObjectCounter,
};
pub use direct::DirectTaskScheduler;
pub use error::{AppResult, SchedulerError, TaskFailure};
pub use heartbeat::{HeartbeatScheduler, HeartbeatState};
pub use scheduler::{
    Capacity, SchedulerCore, SchedulerIntrospect, SchedulerSettings, SchedulerSnapshot,
    SchedulerType, TaskScheduler,
};
pub use sequential::{SequentialThreadTaskScheduler, WorkerState};
pub use task::{logging_fault_handler, FaultHandler, Task};
pub use wire::{InputWire, OutputWire, SolderType, WiredScheduler};
pub use worker_pool::{Job, PoolStats, Spawn, WorkerPool};
