//! Common test utilities
//!
//! An in-memory [`WorkloadStore`] that behaves like the API server for the
//! calls the reconciler makes: resource versions are checked on every write,
//! an Executer whose last finalizer is removed while it is being deleted
//! disappears, and failures can be injected per operation.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use sanjagh::config::ManagerConfig;
use sanjagh::controller::reconciler::Reconciler;
use sanjagh::controller::store::{ResourceKey, StoreError, WorkloadStore};
use sanjagh::crd::{Executer, ExecuterSpec, Phase};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Store operations that can be observed or sabotaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    UpdateWorkload,
    UpdateStatus,
    CreateArtifact,
    UpdateArtifact,
    DeleteArtifact,
}

/// One successful write, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub op: Op,
    /// Phase carried by a status write
    pub phase: Option<Phase>,
    /// Replica count carried by an artifact write
    pub replicas: Option<i32>,
}

#[derive(Debug, Clone)]
pub enum Injected {
    Conflict,
    /// The target is reported missing
    NotFound,
    Failure(String),
    /// Never return, so only cancellation can end the call
    Hang,
}

#[derive(Debug, Default)]
struct Inner {
    workloads: HashMap<ResourceKey, Executer>,
    artifacts: HashMap<ResourceKey, Deployment>,
    next_version: u64,
    writes: Vec<Write>,
    /// Per-operation script; `None` lets that call through
    injected: HashMap<Op, VecDeque<Option<Injected>>>,
    hanging: HashSet<Op>,
}

impl Inner {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed an Executer, assigning it a fresh resource version
    pub fn insert_workload(&self, mut executer: Executer) -> Executer {
        let mut inner = self.inner.lock().unwrap();
        executer.metadata.resource_version = Some(inner.bump());
        inner
            .workloads
            .insert(ResourceKey::from_resource(&executer), executer.clone());
        executer
    }

    /// Seed a Deployment, assigning it a fresh resource version
    pub fn insert_artifact(&self, mut deployment: Deployment) {
        let mut inner = self.inner.lock().unwrap();
        deployment.metadata.resource_version = Some(inner.bump());
        inner
            .artifacts
            .insert(ResourceKey::from_resource(&deployment), deployment);
    }

    pub fn workload(&self, key: &ResourceKey) -> Option<Executer> {
        self.inner.lock().unwrap().workloads.get(key).cloned()
    }

    pub fn artifact(&self, key: &ResourceKey) -> Option<Deployment> {
        self.inner.lock().unwrap().artifacts.get(key).cloned()
    }

    /// Change an Executer as an end user would, bumping its resource version
    pub fn edit_workload(&self, key: &ResourceKey, edit: impl FnOnce(&mut Executer)) {
        let mut inner = self.inner.lock().unwrap();
        let version = inner.bump();
        let executer = inner.workloads.get_mut(key).unwrap();
        edit(executer);
        executer.metadata.resource_version = Some(version);
    }

    /// Make the next call of `op` fail in the given way
    pub fn inject(&self, op: Op, injected: Injected) {
        self.inject_after(op, 0, injected);
    }

    /// Let `skip` calls of `op` succeed, then fail the next one
    pub fn inject_after(&self, op: Op, skip: usize, injected: Injected) {
        let mut script: VecDeque<Option<Injected>> = std::iter::repeat_n(None, skip).collect();
        script.push_back(Some(injected));
        self.inner.lock().unwrap().injected.insert(op, script);
    }

    /// Whether a call of `op` is parked on an injected hang
    pub fn is_hanging(&self, op: Op) -> bool {
        self.inner.lock().unwrap().hanging.contains(&op)
    }

    pub fn writes(&self) -> Vec<Write> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.inner.lock().unwrap().writes.clear();
    }

    /// Phases written to the status, in order
    pub fn phases(&self) -> Vec<Phase> {
        self.writes().iter().filter_map(|w| w.phase).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.writes().iter().filter(|w| w.op == op).count()
    }

    async fn take_injected(
        &self,
        op: Op,
        kind: &'static str,
        key: &ResourceKey,
    ) -> Result<(), StoreError> {
        let injected = self
            .inner
            .lock()
            .unwrap()
            .injected
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .flatten();
        match injected {
            None => Ok(()),
            Some(Injected::Conflict) => Err(conflict(kind, key)),
            Some(Injected::NotFound) => Err(not_found(kind, key)),
            Some(Injected::Failure(message)) => Err(api_failure(kind, key, message)),
            Some(Injected::Hang) => {
                self.inner.lock().unwrap().hanging.insert(op);
                std::future::pending().await
            }
        }
    }

    fn record(&self, write: Write) {
        self.inner.lock().unwrap().writes.push(write);
    }
}

fn conflict(kind: &'static str, key: &ResourceKey) -> StoreError {
    StoreError::Conflict {
        kind,
        key: key.clone(),
        message: "the object has been modified; please apply your changes to the latest version \
                  and try again"
            .to_string(),
    }
}

fn api_failure(kind: &'static str, key: &ResourceKey, message: String) -> StoreError {
    StoreError::Api {
        kind,
        key: key.clone(),
        source: kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message,
            reason: "InternalError".to_string(),
            code: 500,
        }),
    }
}

fn not_found(kind: &'static str, key: &ResourceKey) -> StoreError {
    StoreError::NotFound {
        kind,
        key: key.clone(),
    }
}

#[async_trait]
impl WorkloadStore for MemoryStore {
    async fn get_workload(&self, key: &ResourceKey) -> Result<Option<Executer>, StoreError> {
        Ok(self.workload(key))
    }

    async fn update_workload(&self, workload: &Executer) -> Result<Executer, StoreError> {
        let key = ResourceKey::from_resource(workload);
        self.take_injected(Op::UpdateWorkload, "Executer", &key).await?;

        let updated = {
            let mut inner = self.inner.lock().unwrap();
            let stored = inner
                .workloads
                .get(&key)
                .ok_or_else(|| not_found("Executer", &key))?;
            if stored.metadata.resource_version != workload.metadata.resource_version {
                return Err(conflict("Executer", &key));
            }

            let mut updated = workload.clone();
            // Metadata updates never touch the status subresource
            updated.status = stored.status.clone();
            updated.metadata.resource_version = Some(inner.bump());

            if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
                inner.workloads.remove(&key);
            } else {
                inner.workloads.insert(key, updated.clone());
            }
            updated
        };

        self.record(Write {
            op: Op::UpdateWorkload,
            phase: None,
            replicas: None,
        });
        Ok(updated)
    }

    async fn update_workload_status(&self, workload: &Executer) -> Result<Executer, StoreError> {
        let key = ResourceKey::from_resource(workload);
        self.take_injected(Op::UpdateStatus, "Executer", &key).await?;

        let updated = {
            let mut inner = self.inner.lock().unwrap();
            let version = inner.bump();
            let stored = inner
                .workloads
                .get_mut(&key)
                .ok_or_else(|| not_found("Executer", &key))?;
            if stored.metadata.resource_version != workload.metadata.resource_version {
                return Err(conflict("Executer", &key));
            }
            stored.status = workload.status.clone();
            stored.metadata.resource_version = Some(version);
            stored.clone()
        };

        self.record(Write {
            op: Op::UpdateStatus,
            phase: Some(updated.phase()),
            replicas: None,
        });
        Ok(updated)
    }

    async fn get_artifact(&self, key: &ResourceKey) -> Result<Option<Deployment>, StoreError> {
        Ok(self.artifact(key))
    }

    async fn create_artifact(&self, artifact: &Deployment) -> Result<Deployment, StoreError> {
        let key = ResourceKey::from_resource(artifact);
        self.take_injected(Op::CreateArtifact, "Deployment", &key).await?;

        let created = {
            let mut inner = self.inner.lock().unwrap();
            if inner.artifacts.contains_key(&key) {
                return Err(conflict("Deployment", &key));
            }
            let mut created = artifact.clone();
            created.metadata.resource_version = Some(inner.bump());
            inner.artifacts.insert(key, created.clone());
            created
        };

        self.record(Write {
            op: Op::CreateArtifact,
            phase: None,
            replicas: created.spec.as_ref().and_then(|s| s.replicas),
        });
        Ok(created)
    }

    async fn update_artifact(&self, artifact: &Deployment) -> Result<Deployment, StoreError> {
        let key = ResourceKey::from_resource(artifact);
        self.take_injected(Op::UpdateArtifact, "Deployment", &key).await?;

        let updated = {
            let mut inner = self.inner.lock().unwrap();
            let version = inner.bump();
            let stored = inner
                .artifacts
                .get_mut(&key)
                .ok_or_else(|| not_found("Deployment", &key))?;
            if stored.metadata.resource_version != artifact.metadata.resource_version {
                return Err(conflict("Deployment", &key));
            }
            *stored = artifact.clone();
            stored.metadata.resource_version = Some(version);
            stored.clone()
        };

        self.record(Write {
            op: Op::UpdateArtifact,
            phase: None,
            replicas: updated.spec.as_ref().and_then(|s| s.replicas),
        });
        Ok(updated)
    }

    async fn delete_artifact(&self, key: &ResourceKey) -> Result<(), StoreError> {
        self.take_injected(Op::DeleteArtifact, "Deployment", key).await?;
        self.inner.lock().unwrap().artifacts.remove(key);
        self.record(Write {
            op: Op::DeleteArtifact,
            phase: None,
            replicas: None,
        });
        Ok(())
    }
}

/// A persisted Executer in the `default` namespace
pub fn executer(name: &str, replication: i32) -> Executer {
    let mut executer = Executer::new(
        name,
        ExecuterSpec {
            image: "busybox:1.36".to_string(),
            commands: vec!["sleep".to_string(), "3600".to_string()],
            replication,
        },
    );
    executer.metadata.namespace = Some("default".to_string());
    executer.metadata.uid = Some(format!("uid-{name}"));
    executer
}

pub fn mark_deleted(executer: &mut Executer) {
    executer.metadata.deletion_timestamp =
        Some(serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap());
}

/// Reconciler over `store`, plus the sender that triggers shutdown
pub fn reconciler(store: Arc<MemoryStore>) -> (Reconciler, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    (Reconciler::new(store, &ManagerConfig::default(), rx), tx)
}
