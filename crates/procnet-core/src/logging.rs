//! Tracing subscriber setup.
//!
//! The engine only emits `tracing` events. Binaries and tests that want to
//! see them call one of the functions below once.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a formatting subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`
/// (for example `"info"` or `"procnet_core=debug"`).
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Subscriber for tests: debug level, captured by the test harness.
/// Safe to call from every test.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
