//! Tracing subscriber setup

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatted subscriber filtered by `RUST_LOG`
///
/// Falls back to `default_filter` when `RUST_LOG` is unset or invalid.
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
