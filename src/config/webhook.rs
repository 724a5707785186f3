//! # Webhook Configuration
//!
//! Listener, TLS material and validation bounds for the admission webhook.

use super::ConfigError;
use crate::constants::{
    DEFAULT_MAX_REPLICATION, DEFAULT_METRICS_PORT, DEFAULT_MIN_REPLICATION,
    DEFAULT_WEBHOOK_LISTEN_ADDR,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub server: WebhookServerConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookServerConfig {
    /// Address of the TLS admission listener
    pub listen_addr: String,
    /// Port of the plain HTTP metrics and probe server
    pub management_port: u16,
    pub tls: TlsConfig,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_WEBHOOK_LISTEN_ADDR.to_string(),
            management_port: DEFAULT_METRICS_PORT,
            tls: TlsConfig::default(),
        }
    }
}

/// PEM encoded certificate chain and private key
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

impl WebhookServerConfig {
    /// The admission listener refuses to start without TLS material.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the listen address, the certificate
    /// path or the private key path is empty.
    pub fn validate_tls(&self) -> Result<(), ConfigError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "webhook.server.listen_addr is empty".to_string(),
            ));
        }
        if self.tls.certificate.as_os_str().is_empty()
            || self.tls.private_key.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid(
                "webhook.server.tls.certificate or webhook.server.tls.private_key is empty"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub replication: ReplicationBounds,
}

/// Inclusive replica range accepted by the admission webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplicationBounds {
    pub minimum: i32,
    pub maximum: i32,
}

impl Default for ReplicationBounds {
    fn default() -> Self {
        Self {
            minimum: DEFAULT_MIN_REPLICATION,
            maximum: DEFAULT_MAX_REPLICATION,
        }
    }
}

impl ReplicationBounds {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum < 0 {
            return Err(ConfigError::Invalid(format!(
                "webhook.validation.replication.minimum ({}) must not be negative",
                self.minimum
            )));
        }
        if self.minimum > self.maximum {
            return Err(ConfigError::Invalid(format!(
                "webhook.validation.replication.minimum ({}) is greater than maximum ({})",
                self.minimum, self.maximum
            )));
        }
        Ok(())
    }
}
