//! # Logging
//!
//! Tracing subscriber setup driven by [`LoggerConfig`].
//!
//! `RUST_LOG` always wins. Without it the filter is `sanjagh=<logger.level>`;
//! an unparseable level falls back to `debug` so nothing is silently hidden.

use crate::config::{LogFormat, LoggerConfig};
use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is not set
#[must_use]
pub fn default_directive(config: &LoggerConfig) -> String {
    let level = config.level.trim().to_lowercase();
    if level.parse::<tracing::Level>().is_ok() {
        format!("sanjagh={level}")
    } else {
        eprintln!(
            "using debug level for logging due to an invalid logger.level value '{}'",
            config.level
        );
        "sanjagh=debug".to_string()
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &LoggerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.format {
        LogFormat::Json => builder
            .json()
            .with_current_span(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}")),
        LogFormat::Text => builder
            .with_ansi(config.enable_color)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}")),
    }
}
