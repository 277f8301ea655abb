//! Tests for error types

use prometheus_wiring::core::{SchedulerError, TaskFailure};

#[test]
fn test_invalid_name_error() {
    let err = SchedulerError::InvalidName("foo bar".to_string());
    assert_eq!(format!("{}", err), "invalid scheduler name: `foo bar`");
}

#[test]
fn test_duplicate_name_error() {
    let err = SchedulerError::DuplicateName("ingest".to_string());
    assert_eq!(format!("{}", err), "duplicate scheduler name: `ingest`");
}

#[test]
fn test_flush_disabled_error() {
    let err = SchedulerError::FlushDisabled("ingest".to_string());
    assert_eq!(format!("{}", err), "flushing is not enabled for scheduler `ingest`");
}

#[test]
fn test_lifecycle_errors() {
    assert_eq!(
        SchedulerError::AlreadyStarted("beat".into()).to_string(),
        "`beat` has already been started"
    );
    assert_eq!(
        SchedulerError::NotStarted("beat".into()).to_string(),
        "`beat` has not been started"
    );
    assert_eq!(
        SchedulerError::AlreadyStopped("beat".into()).to_string(),
        "`beat` has already been stopped"
    );
}

#[test]
fn test_pool_shutdown_error() {
    let err = SchedulerError::PoolShutdown;
    assert_eq!(format!("{}", err), "execution pool has been shut down");
}

#[test]
fn test_handler_failure_keeps_context() {
    let source = anyhow::anyhow!("disk full").context("writing event");
    let err = TaskFailure::Handler(source);
    assert_eq!(err.to_string(), "handler failed: writing event: disk full");
}
