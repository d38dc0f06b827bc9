//! `tracing` subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// # Environment
/// - `RUST_LOG`: filter directives (default: `info`),
///   e.g. `RUST_LOG=debug` or `RUST_LOG=emissions_pipeline::estimate=trace`
///
/// # Example
/// ```no_run
/// use emissions_pipeline::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Subscriber for tests: `debug` level through the test writer. Safe to call repeatedly.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
