//! # Executer Status
//!
//! Observed state written exclusively by the controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle phase of an Executer as last observed by the controller
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema,
)]
pub enum Phase {
    #[default]
    Unknown,
    Idle,
    /// The Deployment does not exist yet and is being created
    Creating,
    /// The Deployment matches the desired replica count
    Created,
    /// The Deployment's replica count is being brought in line
    Updating,
    /// The last write to the Deployment failed
    Failed,
}

/// A phase name outside the known set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown phase '{0}'")]
pub struct ParsePhaseError(pub String);

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Unknown,
        Phase::Idle,
        Phase::Creating,
        Phase::Created,
        Phase::Updating,
        Phase::Failed,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Unknown => "Unknown",
            Phase::Idle => "Idle",
            Phase::Creating => "Creating",
            Phase::Created => "Created",
            Phase::Updating => "Updating",
            Phase::Failed => "Failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }
}

/// Status of the Executer resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuterStatus {
    /// Current phase of reconciliation
    #[serde(default)]
    pub phase: Phase,
}
