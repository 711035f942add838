//! Diagnostic tracing for hooks and operator commands.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: diagnostics via `RUST_LOG`, always on stderr.
//!   Not part of hook output.
//!
//! - **Hook output**: the block decision JSON on stdout and deny/reject
//!   feedback on stderr, written by `main`. Unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format. Stdout stays reserved for hook decisions.
///
/// # Example
/// ```bash
/// RUST_LOG=dispatch=debug dispatch stop < input.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
