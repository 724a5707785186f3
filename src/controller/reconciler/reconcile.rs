//! # Reconcile
//!
//! Executes the state machine against a [`WorkloadStore`].
//!
//! Each pass keeps the freshest copy of the Executer and the Deployment
//! returned by the store, so consecutive writes in one pass carry the latest
//! resource version.

use crate::controller::reconciler::artifact::{desired_artifact, replicas_of};
use crate::controller::reconciler::machine::{
    self, Effect, Event, Outcome, State, StoreFailure, WorkloadView,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::store::{ResourceKey, StoreError};
use crate::crd::Executer;
use crate::observability;
use k8s_openapi::api::apps::v1::Deployment;
use kube_runtime::controller::Action;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Entry point used by `kube_runtime::Controller`
///
/// # Errors
///
/// Returns the error of the pass; the error policy schedules the retry.
pub async fn reconcile(
    executer: Arc<Executer>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = ResourceKey::from_resource(executer.as_ref());
    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = key.name.as_str(),
        resource.namespace = key.namespace.as_str(),
        resource.version = executer.metadata.resource_version.as_deref().unwrap_or("unknown"),
    );

    async move {
        observability::metrics::increment_reconciliations();
        let start = Instant::now();
        let result = reconcile_key(&ctx, &key).await;
        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.reset_backoff(&key);
        Ok(into_action(outcome))
    }
    .instrument(span)
    .await
}

fn into_action(outcome: Outcome) -> Action {
    match outcome {
        Outcome::Done => Action::await_change(),
        Outcome::Requeue => {
            observability::metrics::increment_requeues_total("immediate");
            Action::requeue(Duration::ZERO)
        }
        Outcome::RequeueAfter(delay) => {
            observability::metrics::increment_requeues_total("delayed");
            Action::requeue(delay)
        }
    }
}

/// Run one reconcile pass for `key`
///
/// # Errors
///
/// - [`ReconcilerError::Persistence`] when a store call fails with anything but a conflict
/// - [`ReconcilerError::Artifact`] when the Deployment cannot be built
/// - [`ReconcilerError::Cancelled`] when shutdown interrupts a store call
pub async fn reconcile_key(
    ctx: &Reconciler,
    key: &ResourceKey,
) -> Result<Outcome, ReconcilerError> {
    let mut pass = Pass {
        ctx,
        key,
        workload: None,
        desired: None,
        artifact: None,
    };

    let mut state = State::Pending;
    let mut event = Event::Started;
    loop {
        let step = machine::step(state, event);
        state = step.state;
        let Some(effect) = step.effect else {
            break;
        };
        debug!(resource = %key, effect = ?effect, "reconcile.effect");
        event = pass.apply(effect).await?;
    }

    match state {
        State::Done(outcome) => {
            debug!(resource = %key, outcome = ?outcome, "reconcile.done");
            Ok(outcome)
        }
        State::Errored(failure) => Err(failure.into()),
        other => Err(ReconcilerError::InvalidTransition {
            state: format!("{other:?}"),
            event: "no effect".to_string(),
        }),
    }
}

/// Mutable state of a single pass
struct Pass<'a> {
    ctx: &'a Reconciler,
    key: &'a ResourceKey,
    workload: Option<Executer>,
    desired: Option<Deployment>,
    artifact: Option<Deployment>,
}

impl Pass<'_> {
    async fn apply(&mut self, effect: Effect) -> Result<Event, ReconcilerError> {
        match effect {
            Effect::FetchWorkload => {
                match self.guarded(self.ctx.store.get_workload(self.key)).await {
                    Ok(found) => {
                        let view = found.as_ref().map(WorkloadView::from);
                        self.workload = found;
                        Ok(Event::WorkloadFetched(view))
                    }
                    Err(e) => self.failed(effect, e),
                }
            }
            Effect::Cleanup => {
                match self.guarded(self.ctx.store.delete_artifact(self.key)).await {
                    Ok(()) => {
                        info!(resource = %self.key, "Deleted owned Deployment");
                        observability::metrics::increment_artifact_operations("delete");
                        Ok(Event::Written)
                    }
                    Err(e) => self.failed(effect, e),
                }
            }
            Effect::RemoveFinalizer => {
                let mut workload = self.workload()?.clone();
                workload.remove_finalizer();
                self.write_workload(effect, workload).await
            }
            Effect::AddFinalizer => {
                let mut workload = self.workload()?.clone();
                workload.add_finalizer();
                self.write_workload(effect, workload).await
            }
            Effect::FetchArtifact => {
                // The descriptor is computed before the lookup so that an
                // Executer which cannot own a Deployment fails early.
                self.desired = Some(desired_artifact(self.workload()?)?);
                match self.guarded(self.ctx.store.get_artifact(self.key)).await {
                    Ok(found) => {
                        let replicas = found.as_ref().map(replicas_of);
                        self.artifact = found;
                        Ok(Event::ArtifactFetched(replicas))
                    }
                    Err(e) => self.failed(effect, e),
                }
            }
            Effect::SetPhase(phase) => {
                let mut workload = self.workload()?.clone();
                let previous = workload.phase();
                workload.set_phase(phase);
                let store = Arc::clone(&self.ctx.store);
                match self.guarded(store.update_workload_status(&workload)).await {
                    Ok(updated) => {
                        info!(resource = %self.key, from = %previous, to = %phase, "Phase changed");
                        observability::metrics::increment_phase_transitions(phase.as_str());
                        self.workload = Some(updated);
                        Ok(Event::Written)
                    }
                    Err(e) => self.failed(effect, e),
                }
            }
            Effect::CreateArtifact => {
                let desired = match self.desired.take() {
                    Some(desired) => desired,
                    None => desired_artifact(self.workload()?)?,
                };
                let store = Arc::clone(&self.ctx.store);
                match self.guarded(store.create_artifact(&desired)).await {
                    Ok(created) => {
                        info!(
                            resource = %self.key,
                            replicas = replicas_of(&created),
                            "Created Deployment"
                        );
                        observability::metrics::increment_artifact_operations("create");
                        self.artifact = Some(created);
                        Ok(Event::Written)
                    }
                    Err(e) => self.failed(effect, e),
                }
            }
            Effect::ScaleArtifact(replicas) => {
                let Some(mut artifact) = self.artifact.clone() else {
                    return Err(self.missing("Deployment", effect));
                };
                let current = replicas_of(&artifact);
                // Only the replica field is touched; everything else stays as fetched
                artifact.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
                let store = Arc::clone(&self.ctx.store);
                match self.guarded(store.update_artifact(&artifact)).await {
                    Ok(updated) => {
                        info!(
                            resource = %self.key,
                            from = current,
                            to = replicas,
                            "Scaled Deployment"
                        );
                        observability::metrics::increment_artifact_operations("scale");
                        self.artifact = Some(updated);
                        Ok(Event::Written)
                    }
                    Err(e) => self.failed(effect, e),
                }
            }
        }
    }

    async fn write_workload(
        &mut self,
        effect: Effect,
        workload: Executer,
    ) -> Result<Event, ReconcilerError> {
        let store = Arc::clone(&self.ctx.store);
        match self.guarded(store.update_workload(&workload)).await {
            Ok(updated) => {
                info!(resource = %self.key, effect = ?effect, "Updated finalizers");
                self.workload = Some(updated);
                Ok(Event::Written)
            }
            Err(e) => self.failed(effect, e),
        }
    }

    fn workload(&self) -> Result<&Executer, ReconcilerError> {
        self.workload
            .as_ref()
            .ok_or_else(|| self.missing("Executer", Effect::FetchWorkload))
    }

    fn missing(&self, what: &str, effect: Effect) -> ReconcilerError {
        ReconcilerError::InvalidTransition {
            state: format!("{what} {} not loaded", self.key),
            event: format!("{effect:?}"),
        }
    }

    /// Race a store call against the shutdown signal
    async fn guarded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let mut shutdown = self.ctx.shutdown_signal();
        if *shutdown.borrow_and_update() {
            return Err(StoreError::Cancelled);
        }
        let cancelled = async move {
            // A dropped sender means shutdown can no longer be requested
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            biased;
            () = cancelled => Err(StoreError::Cancelled),
            result = call => result,
        }
    }

    /// Classify a failed store call into the event the machine understands
    fn failed(&self, effect: Effect, error: StoreError) -> Result<Event, ReconcilerError> {
        match error {
            StoreError::Cancelled => {
                info!(resource = %self.key, effect = ?effect, "Store call abandoned on shutdown");
                Err(ReconcilerError::Cancelled)
            }
            StoreError::Conflict { .. } => {
                info!(
                    resource = %self.key,
                    effect = ?effect,
                    error = %error,
                    "Version conflict, will retry"
                );
                Ok(Event::StoreFailed(StoreFailure::Conflict))
            }
            StoreError::NotFound { .. } => {
                debug!(
                    resource = %self.key,
                    effect = ?effect,
                    error = %error,
                    "Target vanished during reconcile"
                );
                Ok(Event::StoreFailed(StoreFailure::Gone))
            }
            StoreError::Api { .. } | StoreError::Serialization { .. } => {
                warn!(resource = %self.key, effect = ?effect, error = %error, "Store call failed");
                Ok(Event::StoreFailed(StoreFailure::Failed(error.to_string())))
            }
        }
    }
}
