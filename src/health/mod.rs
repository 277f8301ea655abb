//! Health monitoring of bounded schedulers.

pub mod logger;
pub mod metrics;
pub mod monitor;

pub use logger::HealthMonitorLogger;
pub use metrics::HealthMonitorMetrics;
pub use monitor::HealthMonitor;
