//! Tracing initialization for the session service
//!
//! Filtering follows `RUST_LOG`, falling back to the given default filter.
//! `RUST_LOG_FORMAT` selects the output format:
//! - `json` - JSON formatted output
//! - `compact` - Compact single-line output
//! - `pretty` - Pretty formatted output (default)

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "session_api=debug,session_orchestrator=debug,tower_http=debug";

pub fn init() -> Result<()> {
    init_with_defaults(DEFAULT_FILTER)
}

pub fn init_with_defaults(default_filter: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let registry = tracing_subscriber::registry().with(env_filter);

    let initialized = match format.as_str() {
        "json" => registry.with(fmt::layer().with_ansi(false).json()).try_init(),
        "compact" => registry.with(fmt::layer().compact()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    };

    initialized.map_err(|e| anyhow!("Failed to initialize tracing: {e}"))
}
