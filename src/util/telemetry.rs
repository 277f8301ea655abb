//! Telemetry helpers for structured logging and tracing.

/// Tracing target used for scheduler health warnings, so they can be filtered
/// or routed separately (e.g. `RUST_LOG=wiring_health=warn`).
pub const HEALTH_TARGET: &str = "wiring_health";

/// Initialize tracing/telemetry. Users can install their own subscriber; this
/// helper installs a default env-based subscriber if none is set.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_names(true)
        .try_init();
}
