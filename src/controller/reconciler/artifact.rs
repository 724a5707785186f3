//! # Deployment Template
//!
//! Pure mapping from an `Executer` to the Deployment that runs it.
//! The same Executer always yields the same Deployment.

use crate::crd::Executer;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot reference Executer '{name}' as owner: metadata.name or metadata.uid is missing")]
    MissingOwnerIdentity { name: String },
}

/// Labels stamped on the Deployment, its selector and its pod template
#[must_use]
pub fn labels(executer: &Executer) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "Executer".to_string()),
        ("app.kubernetes.io/instance".to_string(), executer.name_any()),
        ("app.kubernetes.io/part-of".to_string(), "sanjagh".to_string()),
        (
            "app.kubernetes.io/created-by".to_string(),
            "controller-manager".to_string(),
        ),
    ])
}

/// Build the Deployment an Executer should own
///
/// # Errors
///
/// Fails if the owner reference cannot be built because the Executer has not
/// been persisted yet (no name or uid).
pub fn desired_artifact(executer: &Executer) -> Result<Deployment, ArtifactError> {
    let owner = executer
        .controller_owner_ref(&())
        .ok_or_else(|| ArtifactError::MissingOwnerIdentity {
            name: executer.name_any(),
        })?;
    let name = owner.name.clone();
    let labels = labels(executer);

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: executer.namespace(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(executer.spec.replication),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name,
                        image: Some(executer.spec.image.clone()),
                        command: Some(executer.spec.commands.clone()),
                        image_pull_policy: Some("IfNotPresent".to_string()),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

/// Replica count of a Deployment. An unset field means the apps/v1 default of 1.
#[must_use]
pub fn replicas_of(deployment: &Deployment) -> i32 {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1)
}
