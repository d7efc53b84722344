//! Tracing subscriber setup shared by both binaries

use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber
///
/// Level priority: `--verbose` (debug) → `RUST_LOG` → configured level.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing(verbose: bool, configured_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured_level))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
