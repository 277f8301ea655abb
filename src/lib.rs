//! # Prometheus Wiring
//!
//! Backpressure-aware task schedulers and health monitoring for dataflow
//! pipelines built from independently scheduled stages.
//!
//! A pipeline is a set of schedulers connected by typed wires. Each scheduler
//! applies its own concurrency policy, but all of them share one capacity
//! contract: every admitted unit is on-ramped onto a counter and off-ramped
//! exactly once when its handler returns, fails or is squelched. A health
//! monitor polls those counters and reports when any bounded scheduler stays
//! over capacity.
//!
//! ## Scheduler Types
//!
//! - **Concurrent**: tasks run on a shared pool ([`core::WorkerPool`] or a
//!   tokio runtime), in no particular order
//! - **Sequential thread**: one dedicated thread per scheduler, strict FIFO
//! - **Direct**: tasks run on the admitting thread
//! - **Heartbeat**: a pure source that emits timestamps at fixed rates
//!
//! ## Admission
//!
//! | Method   | Over capacity                                   |
//! |----------|-------------------------------------------------|
//! | `put`    | blocks until space frees (if insertion blocks)  |
//! | `offer`  | rejects, returns `false`                        |
//! | `inject` | admits anyway                                   |
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_wiring::builders::TaskSchedulerBuilder;
//! use prometheus_wiring::core::{InputWire, SchedulerType};
//!
//! let scheduler = TaskSchedulerBuilder::new("ingest")
//!     .with_type(SchedulerType::SequentialThread)
//!     .with_unhandled_task_capacity(100)
//!     .with_flushing_enabled(true)
//!     .build()?;
//! scheduler.start()?;
//!
//! let input = InputWire::bind(Arc::clone(&scheduler), |line: String| {
//!     println!("{line}");
//!     Ok(())
//! });
//! input.put("hello".to_string());
//! scheduler.flush()?;
//! scheduler.stop();
//! ```
//!
//! ## Pipelines
//!
//! ```rust,ignore
//! use prometheus_wiring::core::SolderType;
//!
//! let parse = TaskSchedulerBuilder::new("parse").build_wired::<u64>()?;
//! let parse_in = parse.input_wire(|line: String| Ok(line.trim().parse().ok()));
//! parse.output_wire().solder_to(&sum_in, SolderType::Put);
//! ```
//!
//! ## Health Monitoring
//!
//! ```rust,ignore
//! use prometheus_wiring::core::HeartbeatScheduler;
//! use prometheus_wiring::health::HealthMonitor;
//! use prometheus_wiring::metrics::InMemoryMetrics;
//! use prometheus_wiring::util::SystemClock;
//!
//! let metrics = InMemoryMetrics::new();
//! let heartbeat = HeartbeatScheduler::new("health_heartbeat", SystemClock::shared());
//! let changes = registry
//!     .health_monitor(SystemClock::shared(), &config.health)
//!     .with_metrics(&metrics)
//!     .bind_to_heartbeat(&heartbeat, config.health.heartbeat_period())?;
//! changes.solder(|longest| tracing::info!(?longest, "health changed"));
//! heartbeat.start()?;
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for schedulers, the shared pool and health monitoring.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Detection of sustained backlog.
pub mod health;
/// Gauge-based metrics sink abstraction.
pub mod metrics;
/// Runtime adapters for the shared pool.
pub mod runtime;
/// Shared utilities.
pub mod util;
