//! # Executer Spec
//!
//! The `Executer` custom resource: a container image, the command it runs and
//! how many replicas of it should exist.

use crate::constants::EXECUTER_FINALIZER;
use crate::crd::{ExecuterStatus, Phase};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Executer Custom Resource Definition
///
/// The controller materialises every Executer as a Deployment with the same
/// namespace and name.
///
/// # Example
///
/// ```yaml
/// apiVersion: apps.mohammadne.me/v1alpha1
/// kind: Executer
/// metadata:
///   name: sleeper
///   namespace: default
/// spec:
///   image: busybox:1.36
///   commands: ["sleep", "3600"]
///   replication: 3
/// ```
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Executer",
    group = "apps.mohammadne.me",
    version = "v1alpha1",
    namespaced,
    status = "ExecuterStatus",
    shortname = "exe",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Replication", "type":"integer", "jsonPath":".spec.replication"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ExecuterSpec {
    /// Container image run by every replica
    pub image: String,
    /// Command executed inside the container
    #[schemars(length(min = 1))]
    pub commands: Vec<String>,
    /// Desired number of replicas
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub replication: i32,
}

impl Executer {
    /// Whether the resource has been marked for deletion
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether the controller's finalizer is attached
    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|name| name == EXECUTER_FINALIZER))
    }

    /// Attach the controller's finalizer. Returns `false` if it was already present.
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(EXECUTER_FINALIZER.to_string());
        true
    }

    /// Detach the controller's finalizer. Returns `false` if it was not present.
    pub fn remove_finalizer(&mut self) -> bool {
        let Some(finalizers) = self.metadata.finalizers.as_mut() else {
            return false;
        };
        let before = finalizers.len();
        finalizers.retain(|name| name != EXECUTER_FINALIZER);
        before != finalizers.len()
    }

    /// Last phase recorded by the controller (`Unknown` when no status exists)
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Record a new phase in the local copy of the status
    pub fn set_phase(&mut self, phase: Phase) {
        self.status.get_or_insert_with(ExecuterStatus::default).phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn executer() -> Executer {
        Executer::new(
            "sleeper",
            ExecuterSpec {
                image: "busybox".to_string(),
                commands: vec!["sleep".to_string(), "10".to_string()],
                replication: 2,
            },
        )
    }

    #[test]
    fn test_finalizer_add_is_idempotent() {
        let mut exe = executer();
        assert!(!exe.has_finalizer());
        assert!(exe.add_finalizer());
        assert!(!exe.add_finalizer());
        assert_eq!(exe.metadata.finalizers.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_finalizer_remove_keeps_foreign_finalizers() {
        let mut exe = executer();
        exe.metadata.finalizers = Some(vec![
            "other.example.com/guard".to_string(),
            EXECUTER_FINALIZER.to_string(),
        ]);
        assert!(exe.remove_finalizer());
        assert!(!exe.remove_finalizer());
        assert_eq!(
            exe.metadata.finalizers,
            Some(vec!["other.example.com/guard".to_string()])
        );
    }

    #[test]
    fn test_phase_defaults_to_unknown() {
        let mut exe = executer();
        assert_eq!(exe.phase(), Phase::Unknown);
        exe.set_phase(Phase::Creating);
        assert_eq!(exe.phase(), Phase::Creating);
    }

    #[test]
    fn test_is_deleting() {
        let mut exe = executer();
        assert!(!exe.is_deleting());
        let now: Time = serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z"))
            .expect("timestamp should deserialize");
        exe.metadata.deletion_timestamp = Some(now);
        assert!(exe.is_deleting());
    }

    #[test]
    fn test_spec_wire_format() {
        let spec: ExecuterSpec = serde_json::from_value(serde_json::json!({
            "image": "nginx",
            "commands": ["nginx", "-g", "daemon off;"]
        }))
        .expect("spec should deserialize");
        assert_eq!(spec.replication, 0);
        assert_eq!(spec.commands.len(), 3);
    }
}
