//! Configuration models for schedulers, the shared pool, and health monitoring.

pub mod pool;
pub mod wiring;

pub use pool::WorkerPoolConfig;
pub use wiring::{HealthMonitorConfig, SchedulerConfig, WiringConfig};
