//! # Manager Configuration
//!
//! Settings for the reconciliation controller process.

use super::ConfigError;
use crate::constants::{
    DEFAULT_ERROR_BACKOFF_MAX_SECS, DEFAULT_ERROR_BACKOFF_MIN_SECS,
    DEFAULT_MAX_CONCURRENT_RECONCILES, DEFAULT_METRICS_PORT, DEFAULT_SERVER_POLL_INTERVAL_MS,
    DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Maximum number of Executers reconciled at the same time
    pub max_concurrent_reconciles: u16,
    /// First delay of the per-resource error backoff (seconds)
    pub error_backoff_min_secs: u64,
    /// Upper bound of the per-resource error backoff (seconds)
    pub error_backoff_max_secs: u64,
    /// How long to wait for the metrics server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// Poll interval while waiting for the metrics server (milliseconds)
    pub server_poll_interval_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            max_concurrent_reconciles: DEFAULT_MAX_CONCURRENT_RECONCILES,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ManagerConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.error_backoff_min_secs == 0 {
            return Err(ConfigError::Invalid(
                "manager.error_backoff_min_secs must be at least 1".to_string(),
            ));
        }
        if self.error_backoff_min_secs > self.error_backoff_max_secs {
            return Err(ConfigError::Invalid(format!(
                "manager.error_backoff_min_secs ({}) is greater than manager.error_backoff_max_secs ({})",
                self.error_backoff_min_secs, self.error_backoff_max_secs
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn server_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.server_startup_timeout_secs)
    }

    #[must_use]
    pub fn server_poll_interval(&self) -> Duration {
        Duration::from_millis(self.server_poll_interval_ms)
    }
}
