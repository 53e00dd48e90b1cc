//! Development-time tracing for debugging pipeline runs.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Not persisted, not part of postflow product output.
//!
//! - **Run logging (`io/run_log`)**: Product artifacts in
//!   `<output_dir>/runs/<run-id>/`. Written per run, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn` if unset. `verbose` raises the
/// default to `postflow=info` so stage transitions and scores are shown.
///
/// # Example
/// ```bash
/// RUST_LOG=postflow=debug postflow create "10 tips for better mornings"
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "postflow=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
