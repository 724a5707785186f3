//! # Registry
//!
//! Resolves the resource named by an admission request to one of the kinds
//! this webhook knows how to validate.

use crate::constants::{API_GROUP, EXECUTER_RESOURCE};
use kube::core::GroupVersionResource;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported resource: group '{group}', resource '{resource}'")]
pub struct UnsupportedResource {
    pub group: String,
    pub resource: String,
}

/// Kinds with a registered validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Executers,
}

impl TargetKind {
    /// # Errors
    ///
    /// Returns [`UnsupportedResource`] for any group/resource pair without a validator.
    pub fn resolve(resource: &GroupVersionResource) -> Result<Self, UnsupportedResource> {
        match (resource.group.as_str(), resource.resource.as_str()) {
            (API_GROUP, EXECUTER_RESOURCE) => Ok(Self::Executers),
            (group, resource) => Err(UnsupportedResource {
                group: group.to_string(),
                resource: resource.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executers => EXECUTER_RESOURCE,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
