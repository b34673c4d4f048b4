//! Tracing subscriber setup for the binary
//!
//! Logs go to stderr so stdout stays a clean CSV report. `RUST_LOG` wins over
//! the level passed in; an unparsable level falls back to `info`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
