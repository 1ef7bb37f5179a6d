//! Diagnostic tracing for the agent loop.
//!
//! Tracing output (this module) goes to stderr and is controlled by `RUST_LOG`.
//! It is separate from the per-step console lines and the JSON run reports,
//! which are always produced.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output: stderr, compact format.
///
/// ```bash
/// RUST_LOG=vision_qa=debug vision-qa run
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (e.g. from a test binary) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
