//! Logger settings.

use serde::{Deserialize, Serialize};

/// Output encoding of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Default level for the `sanjagh` target (overridden by `RUST_LOG`)
    pub level: String,
    pub format: LogFormat,
    /// ANSI colours in text output
    pub enable_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            enable_color: true,
        }
    }
}
