//! # State Store
//!
//! The reconciler never talks to the API server directly. Every read and write
//! goes through [`WorkloadStore`], which keeps the state machine testable
//! without a cluster and makes version conflicts a distinguishable outcome.
//!
//! [`KubeStore`] is the production implementation on top of `kube::Api`.

use crate::constants::CONTROLLER_NAME;
use crate::crd::Executer;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Identity of an Executer and of the Deployment it owns
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object. Missing namespaces read as `default`.
    pub fn from_resource<K: ResourceExt>(obj: &K) -> Self {
        Self::new(
            obj.namespace().unwrap_or_else(|| "default".to_string()),
            obj.name_any(),
        )
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Outcome taxonomy of store calls
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object changed since it was read, or already exists on create
    #[error("conflict writing {kind} {key}: {message}")]
    Conflict {
        kind: &'static str,
        key: ResourceKey,
        message: String,
    },

    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ResourceKey },

    #[error("API error on {kind} {key}: {source}")]
    Api {
        kind: &'static str,
        key: ResourceKey,
        #[source]
        source: kube::Error,
    },

    #[error("failed to serialize {kind} {key}: {source}")]
    Serialization {
        kind: &'static str,
        key: ResourceKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("store call cancelled")]
    Cancelled,
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Classify a kube error. 409 is a conflict, 404 not-found, anything else is opaque.
    #[must_use]
    pub fn from_kube(kind: &'static str, key: &ResourceKey, error: kube::Error) -> Self {
        match error {
            kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict {
                kind,
                key: key.clone(),
                message: api_err.message,
            },
            kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
                kind,
                key: key.clone(),
            },
            source => StoreError::Api {
                kind,
                key: key.clone(),
                source,
            },
        }
    }
}

/// Optimistic-concurrency access to Executers and their Deployments
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Fetch an Executer. `Ok(None)` when it does not exist.
    async fn get_workload(&self, key: &ResourceKey) -> Result<Option<Executer>, StoreError>;

    /// Persist metadata changes (finalizers). Fails with `Conflict` if the
    /// resource version is stale.
    async fn update_workload(&self, workload: &Executer) -> Result<Executer, StoreError>;

    /// Persist the status subresource. Fails with `Conflict` if the resource
    /// version is stale.
    async fn update_workload_status(&self, workload: &Executer) -> Result<Executer, StoreError>;

    /// Fetch the Deployment with the same identity. `Ok(None)` when it does not exist.
    async fn get_artifact(&self, key: &ResourceKey) -> Result<Option<Deployment>, StoreError>;

    /// Create a Deployment. Fails with `Conflict` if it already exists.
    async fn create_artifact(&self, artifact: &Deployment) -> Result<Deployment, StoreError>;

    /// Replace a previously fetched Deployment. Fails with `Conflict` if the
    /// resource version is stale.
    async fn update_artifact(&self, artifact: &Deployment) -> Result<Deployment, StoreError>;

    /// Delete the Deployment. A Deployment that is already gone is success.
    async fn delete_artifact(&self, key: &ResourceKey) -> Result<(), StoreError>;
}

const WORKLOAD_KIND: &str = "Executer";
const ARTIFACT_KIND: &str = "Deployment";

/// [`WorkloadStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn executers(&self, namespace: &str) -> Api<Executer> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl WorkloadStore for KubeStore {
    async fn get_workload(&self, key: &ResourceKey) -> Result<Option<Executer>, StoreError> {
        self.executers(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(WORKLOAD_KIND, key, e))
    }

    async fn update_workload(&self, workload: &Executer) -> Result<Executer, StoreError> {
        let key = ResourceKey::from_resource(workload);
        debug!(resource = %key, "Updating Executer metadata");
        self.executers(&key.namespace)
            .replace(&key.name, &PostParams::default(), workload)
            .await
            .map_err(|e| StoreError::from_kube(WORKLOAD_KIND, &key, e))
    }

    async fn update_workload_status(&self, workload: &Executer) -> Result<Executer, StoreError> {
        let key = ResourceKey::from_resource(workload);
        debug!(resource = %key, phase = %workload.phase(), "Updating Executer status");
        // Carrying resourceVersion makes the merge patch optimistic
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": workload.metadata.resource_version,
            },
            "status": workload.status,
        });
        self.executers(&key.namespace)
            .patch_status(
                &key.name,
                &PatchParams::apply(CONTROLLER_NAME),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| StoreError::from_kube(WORKLOAD_KIND, &key, e))
    }

    async fn get_artifact(&self, key: &ResourceKey) -> Result<Option<Deployment>, StoreError> {
        self.deployments(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(ARTIFACT_KIND, key, e))
    }

    async fn create_artifact(&self, artifact: &Deployment) -> Result<Deployment, StoreError> {
        let key = ResourceKey::from_resource(artifact);
        debug!(resource = %key, "Creating Deployment");
        self.deployments(&key.namespace)
            .create(&PostParams::default(), artifact)
            .await
            .map_err(|e| StoreError::from_kube(ARTIFACT_KIND, &key, e))
    }

    async fn update_artifact(&self, artifact: &Deployment) -> Result<Deployment, StoreError> {
        let key = ResourceKey::from_resource(artifact);
        debug!(resource = %key, "Replacing Deployment");
        self.deployments(&key.namespace)
            .replace(&key.name, &PostParams::default(), artifact)
            .await
            .map_err(|e| StoreError::from_kube(ARTIFACT_KIND, &key, e))
    }

    async fn delete_artifact(&self, key: &ResourceKey) -> Result<(), StoreError> {
        debug!(resource = %key, "Deleting Deployment");
        match self
            .deployments(&key.namespace)
            .delete(&key.name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(StoreError::from_kube(ARTIFACT_KIND, key, e)),
        }
    }
}
