//! Diagnostic output for the `chatguard` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the host. The binary writes to stderr so that stdout carries nothing
//! but command output.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise
/// `verbose` selects between `debug` and `warn` for this crate.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "chatguard=debug"
    } else {
        "chatguard=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A subscriber may already be installed when embedded in a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
