//! Tests for building schedulers from configuration

use prometheus_wiring::builders::build_schedulers;
use prometheus_wiring::config::WiringConfig;
use prometheus_wiring::core::{
    Capacity, SchedulerError, SchedulerIntrospect, SchedulerType, Spawn, WorkerPool,
};
use std::sync::Arc;

fn spawner(config: &WiringConfig) -> Arc<dyn Spawn> {
    Arc::new(WorkerPool::new(config.pool.clone()).unwrap())
}

#[test]
fn test_build_schedulers_from_config() {
    let config = WiringConfig::from_json_str(
        r#"{
            "pool": { "worker_count": 1 },
            "schedulers": {
                "ingest": { "type": "sequential_thread", "unhandled_task_capacity": 8 },
                "fanout": { "type": "concurrent" },
                "inline": { "type": "direct", "unhandled_task_capacity": 2 }
            }
        }"#,
    )
    .unwrap();

    let schedulers = build_schedulers(&config, &spawner(&config)).unwrap();
    assert_eq!(schedulers.len(), 3);

    let ingest = &schedulers["ingest"];
    assert_eq!(ingest.name(), "ingest");
    assert_eq!(ingest.scheduler_type(), SchedulerType::SequentialThread);
    assert_eq!(ingest.capacity(), Capacity::Bounded(8));
    assert_eq!(schedulers["fanout"].scheduler_type(), SchedulerType::Concurrent);
    assert_eq!(schedulers["fanout"].capacity(), Capacity::Unlimited);
    assert_eq!(schedulers["inline"].scheduler_type(), SchedulerType::Direct);
}

#[test]
fn test_build_schedulers_rejects_bad_names() {
    let config = WiringConfig::from_json_str(
        r#"{ "pool": { "worker_count": 1 }, "schedulers": { "bad-name": { "type": "direct" } } }"#,
    )
    .unwrap();

    let result = build_schedulers(&config, &spawner(&config));
    assert!(matches!(result, Err(SchedulerError::InvalidName(_))));
}
