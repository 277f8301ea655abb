//! Tests for configuration validation

use prometheus_wiring::config::{
    HealthMonitorConfig, SchedulerConfig, WiringConfig, WorkerPoolConfig,
};
use prometheus_wiring::config::wiring::{
    ENV_HEALTH_HEARTBEAT_PERIOD_MS, ENV_HEALTH_LOG_PERIOD_MS, ENV_HEALTH_LOG_THRESHOLD_MS,
};
use prometheus_wiring::core::{Capacity, SchedulerType};
use std::env;
use std::time::Duration;

#[test]
fn test_worker_pool_config_validation() {
    let valid = WorkerPoolConfig::new().with_worker_count(4);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_worker_pool_config_invalid_worker_count() {
    let invalid = WorkerPoolConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_pool_config_invalid_stack_size() {
    let invalid = WorkerPoolConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_pool_config_invalid_prefix() {
    let invalid = WorkerPoolConfig::new().with_thread_name_prefix("");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_capacity() {
    let mut config = SchedulerConfig::new(SchedulerType::Concurrent);
    assert_eq!(config.capacity(), Capacity::Unlimited);
    config.unhandled_task_capacity = Some(500);
    assert_eq!(config.capacity(), Capacity::Bounded(500));
    assert!(config.validate().is_ok());
}

#[test]
fn test_scheduler_config_zero_capacity() {
    let mut config = SchedulerConfig::new(SchedulerType::SequentialThread);
    config.unhandled_task_capacity = Some(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_scheduler_config_rejects_heartbeat() {
    let config = SchedulerConfig::new(SchedulerType::Heartbeat);
    assert!(config.validate().is_err());
}

#[test]
fn test_health_config_defaults() {
    let config = HealthMonitorConfig::default();
    assert_eq!(config.log_threshold(), Duration::from_secs(5));
    assert_eq!(config.log_period(), Duration::from_secs(600));
    assert_eq!(config.heartbeat_period(), Duration::from_millis(100));
    assert!(config.validate().is_ok());
}

#[test]
fn test_health_config_zero_heartbeat() {
    let config = HealthMonitorConfig {
        heartbeat_period_ms: 0,
        ..HealthMonitorConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_health_config_from_env_overrides() {
    // One test owns these variables; the process environment is shared.
    let keys = [
        ENV_HEALTH_LOG_THRESHOLD_MS,
        ENV_HEALTH_LOG_PERIOD_MS,
        ENV_HEALTH_HEARTBEAT_PERIOD_MS,
    ];
    for key in keys {
        env::remove_var(key);
    }
    assert_eq!(HealthMonitorConfig::from_env().unwrap(), HealthMonitorConfig::default());

    env::set_var(ENV_HEALTH_LOG_THRESHOLD_MS, "2500");
    env::set_var(ENV_HEALTH_LOG_PERIOD_MS, " 60000 ");
    env::set_var(ENV_HEALTH_HEARTBEAT_PERIOD_MS, "20");
    let config = HealthMonitorConfig::from_env().unwrap();
    assert_eq!(config.log_threshold(), Duration::from_millis(2_500));
    assert_eq!(config.log_period(), Duration::from_secs(60));
    assert_eq!(config.heartbeat_period(), Duration::from_millis(20));

    env::set_var(ENV_HEALTH_LOG_PERIOD_MS, "ten minutes");
    let err = HealthMonitorConfig::from_env().unwrap_err();
    assert!(err.contains(ENV_HEALTH_LOG_PERIOD_MS), "unexpected error: {err}");
    env::set_var(ENV_HEALTH_LOG_PERIOD_MS, "60000");

    env::set_var(ENV_HEALTH_HEARTBEAT_PERIOD_MS, "-5");
    assert!(HealthMonitorConfig::from_env().is_err());

    env::set_var(ENV_HEALTH_HEARTBEAT_PERIOD_MS, "0");
    assert!(HealthMonitorConfig::from_env().is_err());

    for key in keys {
        env::remove_var(key);
    }
}

#[test]
fn test_wiring_config_from_json() {
    let json = r#"{
        "pool": { "worker_count": 2 },
        "schedulers": {
            "ingest": { "type": "sequential_thread", "unhandled_task_capacity": 100, "flush_enabled": true },
            "transform": { "type": "concurrent", "insertion_is_blocking": false }
        },
        "health": { "log_threshold_ms": 3000 }
    }"#;

    let config = WiringConfig::from_json_str(json).unwrap();
    assert_eq!(config.pool.worker_count, 2);
    assert_eq!(config.health.log_threshold(), Duration::from_secs(3));
    assert_eq!(config.health.log_period_ms, 600_000);

    let ingest = &config.schedulers["ingest"];
    assert_eq!(ingest.scheduler_type, SchedulerType::SequentialThread);
    assert_eq!(ingest.capacity(), Capacity::Bounded(100));
    assert!(ingest.flush_enabled);
    assert!(ingest.insertion_is_blocking);

    let transform = &config.schedulers["transform"];
    assert_eq!(transform.capacity(), Capacity::Unlimited);
    assert!(!transform.insertion_is_blocking);
}

#[test]
fn test_wiring_config_empty_schedulers() {
    let result = WiringConfig::from_json_str(r#"{ "schedulers": {} }"#);
    assert!(result.is_err());
}

#[test]
fn test_wiring_config_parse_error() {
    let result = WiringConfig::from_json_str("{ not json");
    assert!(result.unwrap_err().starts_with("parse error"));
}
