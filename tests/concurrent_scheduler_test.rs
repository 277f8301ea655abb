//! Integration tests for the concurrent scheduler on the shared pool
//!
//! These tests validate:
//! - Every admitted task completes, in any order
//! - A failing task never blocks the rest
//! - Work really runs in parallel
//! - Jobs discarded by a shut-down pool still release capacity

use parking_lot::Mutex;
use prometheus_wiring::builders::TaskSchedulerBuilder;
use prometheus_wiring::config::WorkerPoolConfig;
use prometheus_wiring::core::{
    FaultHandler, InputWire, SchedulerIntrospect, SchedulerType, Spawn, Task, TaskFailure,
    TaskScheduler, WorkerPool,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn pool(workers: usize) -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(WorkerPoolConfig::new().with_worker_count(workers)).unwrap())
}

fn concurrent(name: &str, pool: &Arc<WorkerPool>, capacity: Option<u64>) -> Arc<dyn TaskScheduler> {
    let spawner: Arc<dyn Spawn> = Arc::clone(pool) as Arc<dyn Spawn>;
    let mut builder = TaskSchedulerBuilder::new(name)
        .with_type(SchedulerType::Concurrent)
        .with_flushing_enabled(true)
        .with_spawner(spawner);
    if let Some(capacity) = capacity {
        builder = builder.with_unhandled_task_capacity(capacity);
    }
    builder.build().unwrap()
}

#[test]
fn test_all_tasks_complete() {
    let pool = pool(4);
    let scheduler = concurrent("fanout", &pool, Some(50));
    let seen = Arc::new(Mutex::new(HashSet::new()));

    let input = {
        let seen = Arc::clone(&seen);
        InputWire::bind(Arc::clone(&scheduler), move |value: u32| {
            seen.lock().insert(value);
            Ok(())
        })
    };
    for value in 0..1_000 {
        input.put(value);
    }

    scheduler.flush().unwrap();
    assert_eq!(seen.lock().len(), 1_000);
    assert_eq!(scheduler.unprocessed_task_count(), 0);
    pool.shutdown();
}

#[test]
fn test_failure_does_not_block_others() {
    let failures = Arc::new(AtomicU64::new(0));
    let handler: FaultHandler = {
        let failures = Arc::clone(&failures);
        Arc::new(move |_: &str, _: &TaskFailure| {
            failures.fetch_add(1, Ordering::SeqCst);
        })
    };

    let pool = pool(2);
    let spawner: Arc<dyn Spawn> = Arc::clone(&pool) as Arc<dyn Spawn>;
    let scheduler = TaskSchedulerBuilder::new("mixed")
        .with_type(SchedulerType::Concurrent)
        .with_flushing_enabled(true)
        .with_fault_handler(handler)
        .with_spawner(spawner)
        .build()
        .unwrap();

    let completed = Arc::new(AtomicU64::new(0));
    for value in 0..100_u32 {
        let completed = Arc::clone(&completed);
        scheduler.put(Task::new(move || {
            if value % 10 == 0 {
                panic!("task {value} failed");
            }
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    }

    scheduler.flush().unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), 90);
    assert_eq!(failures.load(Ordering::SeqCst), 10);
    assert_eq!(pool.stats().submitted_jobs, 100);
    pool.shutdown();
}

#[test]
fn test_tasks_run_in_parallel() {
    const PARTIES: usize = 4;

    let pool = pool(PARTIES);
    let scheduler = concurrent("parallel", &pool, None);
    // Only passes if all parties are inside a handler at the same time.
    let barrier = Arc::new(Barrier::new(PARTIES));

    for _ in 0..PARTIES {
        let barrier = Arc::clone(&barrier);
        scheduler.put(Task::new(move || {
            barrier.wait();
            Ok(())
        }));
    }

    scheduler.flush().unwrap();
    pool.shutdown();
}

#[test]
fn test_offer_and_inject_at_capacity() {
    let pool = pool(1);
    let scheduler = concurrent("gate", &pool, Some(2));
    let release = Arc::new(Barrier::new(2));

    {
        let release = Arc::clone(&release);
        scheduler.put(Task::new(move || {
            release.wait();
            Ok(())
        }));
    }
    assert!(scheduler.offer(Task::new(|| Ok(()))));
    assert!(!scheduler.offer(Task::new(|| Ok(()))));
    scheduler.inject(Task::new(|| Ok(())));
    assert_eq!(scheduler.unprocessed_task_count(), 3);

    release.wait();
    scheduler.flush().unwrap();
    assert_eq!(scheduler.unprocessed_task_count(), 0);
    pool.shutdown();
}

#[test]
fn test_discarded_jobs_release_capacity() {
    let pool = pool(1);
    let scheduler = concurrent("late", &pool, Some(4));
    pool.shutdown();

    let ran = Arc::new(AtomicU64::new(0));
    for _ in 0..3 {
        let ran = Arc::clone(&ran);
        scheduler.put(Task::new(move || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    }

    assert_eq!(scheduler.unprocessed_task_count(), 0);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[cfg(feature = "tokio-runtime")]
#[test]
fn test_tokio_spawner_runs_tasks() {
    use prometheus_wiring::runtime::TokioSpawner;

    let spawner = TokioSpawner::with_worker_threads(2).unwrap();
    assert_eq!(spawner.parallelism(), 2);

    let scheduler = TaskSchedulerBuilder::new("tokio_backed")
        .with_type(SchedulerType::Concurrent)
        .with_unhandled_task_capacity(16)
        .with_flushing_enabled(true)
        .with_spawner(Arc::new(spawner))
        .build()
        .unwrap();

    let done = Arc::new(AtomicU64::new(0));
    for _ in 0..64 {
        let done = Arc::clone(&done);
        scheduler.put(Task::new(move || {
            thread::sleep(Duration::from_millis(1));
            done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    }

    scheduler.flush().unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 64);
}
