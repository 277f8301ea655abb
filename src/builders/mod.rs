//! Builders to construct schedulers from configuration, and the registry that
//! holds them.

pub mod registry;
pub mod scheduler_builder;

pub use registry::SchedulerRegistry;
pub use scheduler_builder::{build_schedulers, validate_name, TaskSchedulerBuilder};
