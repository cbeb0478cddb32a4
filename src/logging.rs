//! Log output setup
//!
//! Logs go to stderr so stdout only carries lookup results. The filter comes
//! from `RUST_LOG`, falling back to `info` (or `debug` with `--verbose`).

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
