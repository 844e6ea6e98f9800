// File: src/logging.rs
//
// Diagnostic tracing for template compilation and rendering.
// The library only emits `tracing` events (`debug` for compile and render
// summaries, `trace` for loop iterations and termination signals). Hosts
// that already install a subscriber need nothing from this module.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize a stderr subscriber filtered by `RUST_LOG`.
///
/// Defaults to `warn` if unset. Calling it again, or after another
/// subscriber is installed, does nothing.
///
/// # Example
/// ```bash
/// RUST_LOG=stencil_loops=trace cargo test
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
