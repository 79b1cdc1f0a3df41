//! Diagnostics for headless runs.
//!
//! Reads `RUST_LOG`, defaulting to `warn`, and writes compact lines to stderr.
//! The TUI never installs a subscriber since it owns the terminal.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// # Example
/// ```bash
/// RUST_LOG=rooms_agent_core=debug rooms_agent_tui --headless --difficulty easy
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
