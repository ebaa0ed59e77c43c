//! Tracing subscriber setup.
//!
//! Logs always go to stderr: in stdio mode stdout carries the MCP protocol
//! and must stay clean.

use tracing_subscriber::EnvFilter;

/// Picks the filter: `RUST_LOG`, then the configured level, then `default`.
pub fn build_filter(configured: Option<&str>, default: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    configured
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_tracing(configured: Option<&str>, default: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(configured, default))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}
