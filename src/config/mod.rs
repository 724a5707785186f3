//! # Configuration
//!
//! Process configuration shared by the `manager` and `webhook` commands.
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults (see [`crate::constants`])
//! 2. An optional YAML file (`--config`, `SANJAGH_CONFIG`, or the ConfigMap
//!    mounted at `/tmp/sanjagh/config.yaml` when `RUNNING_INSIDE_POD` is set)
//! 3. Environment variables prefixed with `SANJAGH__`, using `__` between
//!    nested keys (e.g. `SANJAGH__WEBHOOK__VALIDATION__REPLICATION__MINIMUM=2`)
//!
//! The merged result is validated before it is handed out.

mod env;
mod logger;
mod manager;
mod webhook;

pub use logger::{LogFormat, LoggerConfig};
pub use manager::ManagerConfig;
pub use webhook::{
    ReplicationBounds, TlsConfig, ValidationConfig, WebhookConfig, WebhookServerConfig,
};

use crate::constants::IN_POD_CONFIG_PATH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for environment variable {key}: {message}")]
    Env { key: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logger: LoggerConfig,
    pub manager: ManagerConfig,
    pub webhook: WebhookConfig,
}

impl Config {
    /// Load configuration from the optional file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, an environment
    /// override cannot be applied, or the merged result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(path, std::env::vars())
    }

    /// Same as [`Config::load`] with an explicit set of environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from<I>(path: Option<&Path>, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config = env::apply_overrides(config, vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file on top of the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse YAML text on top of the defaults. Missing keys keep their default.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML for this schema.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// TLS material is checked separately by [`WebhookServerConfig::validate_tls`]
    /// because only the webhook command needs it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.webhook.validation.replication.validate()?;
        self.manager.validate()?;
        Ok(())
    }
}

/// Work out which configuration file to read, if any.
///
/// An explicit path wins. Otherwise the in-pod ConfigMap mount is used when
/// `RUNNING_INSIDE_POD` is set to a non-empty value.
#[must_use]
pub fn resolve_config_path(explicit: Option<PathBuf>, running_inside_pod: bool) -> Option<PathBuf> {
    explicit.or_else(|| running_inside_pod.then(|| PathBuf::from(IN_POD_CONFIG_PATH)))
}

/// Whether the process was started inside a pod (`RUNNING_INSIDE_POD` non-empty)
#[must_use]
pub fn running_inside_pod() -> bool {
    std::env::var("RUNNING_INSIDE_POD").is_ok_and(|v| !v.is_empty())
}
