//! Tracing subscriber setup for test runs

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber writing through the test capture.
///
/// `RUST_LOG` wins over `level`. Calling this more than once is harmless;
/// only the first call installs a subscriber.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .try_init();
}
