//! Diagnostic logging for the `arbor` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset, so config warnings still
/// show. Output goes to stderr in compact format, keeping stdout for
/// command output.
///
/// # Example
/// ```bash
/// RUST_LOG=arbor=debug arbor simulate --times constant,3
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (e.g. from a test harness) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
