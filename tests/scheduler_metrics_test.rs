//! Integration tests for per-scheduler metrics
//!
//! Gauges are read back through the in-memory sink.

use prometheus_wiring::builders::TaskSchedulerBuilder;
use prometheus_wiring::core::{SchedulerType, Task, TaskScheduler};
use prometheus_wiring::metrics::InMemoryMetrics;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn sequential(name: &str, metrics: &InMemoryMetrics, unhandled: bool, busy: bool) -> Arc<dyn TaskScheduler> {
    TaskSchedulerBuilder::new(name)
        .with_type(SchedulerType::SequentialThread)
        .with_unhandled_task_capacity(100)
        .with_flushing_enabled(true)
        .with_metrics(metrics, unhandled, busy)
        .build()
        .unwrap()
}

#[test]
fn test_only_enabled_gauges_are_registered() {
    let metrics = InMemoryMetrics::new();
    let _both = sequential("both", &metrics, true, true);
    let _busy = sequential("busy_only", &metrics, false, true);
    let _unhandled = sequential("unhandled_only", &metrics, true, false);
    let _none = sequential("neither", &metrics, false, false);

    assert_eq!(
        metrics.keys(),
        vec![
            "both.busy_fraction".to_string(),
            "both.unhandled_task_count".to_string(),
            "busy_only.busy_fraction".to_string(),
            "unhandled_only.unhandled_task_count".to_string(),
        ]
    );
}

#[test]
fn test_unhandled_gauge_follows_outstanding_work() {
    let metrics = InMemoryMetrics::new();
    let scheduler = sequential("tracked", &metrics, true, false);
    let unhandled = || metrics.integer_value("tracked.unhandled_task_count");
    assert_eq!(unhandled(), Some(0));

    // Not started yet, so everything stays outstanding.
    for _ in 0..3 {
        scheduler.put(Task::new(|| Ok(())));
    }
    scheduler.inject(Task::weighted(4, || Ok(())));
    assert!(scheduler.offer(Task::new(|| Ok(()))));
    assert_eq!(unhandled(), Some(8));

    scheduler.start().unwrap();
    scheduler.flush().unwrap();
    assert_eq!(unhandled(), Some(0));
    scheduler.stop();
}

#[test]
fn test_busy_fraction_published_for_sequential_worker() {
    let metrics = InMemoryMetrics::new();
    let scheduler = sequential("worker", &metrics, false, true);
    let busy = || metrics.fraction_value("worker.busy_fraction").unwrap_or_default();
    assert!(busy() < f64::EPSILON);

    scheduler.start().unwrap();
    for _ in 0..6 {
        scheduler.put(Task::new(|| {
            thread::sleep(Duration::from_millis(30));
            Ok(())
        }));
    }

    assert!(
        wait_for(|| busy() > 0.5, Duration::from_secs(2)),
        "busy fraction stayed at {}",
        busy()
    );
    scheduler.flush().unwrap();

    // Idle samples bring it back down.
    assert!(
        wait_for(|| busy() < 0.1, Duration::from_secs(2)),
        "busy fraction stuck at {}",
        busy()
    );
    scheduler.stop();
}
