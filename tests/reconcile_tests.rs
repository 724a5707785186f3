//! # Reconciliation Integration Tests
//!
//! Drives full reconcile passes against the in-memory store and checks the
//! writes they produce.

mod common;

use common::{executer, mark_deleted, reconciler, Injected, MemoryStore, Op, Write};
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use sanjagh::controller::reconciler::{
    desired_artifact, reconcile, reconcile_key, replicas_of, Outcome, ReconcilerError,
};
use sanjagh::controller::store::ResourceKey;
use sanjagh::crd::Phase;
use sanjagh::runtime::error_policy::handle_reconciliation_error;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn key(name: &str) -> ResourceKey {
    ResourceKey::new("default", name)
}

/// Run passes until the controller has nothing left to do
async fn converge(store: &Arc<MemoryStore>, name: &str) {
    let (ctx, _shutdown) = reconciler(Arc::clone(store));
    for _ in 0..5 {
        if reconcile_key(&ctx, &key(name)).await.unwrap() == Outcome::Done {
            return;
        }
    }
    panic!("{name} did not converge within 5 passes");
}

#[tokio::test]
async fn test_new_executer_goes_creating_then_created() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    let (ctx, _shutdown) = reconciler(Arc::clone(&store));

    // First pass creates the Deployment and defers the re-check
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(Duration::from_secs(60)));
    assert_eq!(store.phases(), vec![Phase::Creating]);
    let deployment = store.artifact(&key("sleeper")).expect("Deployment created");
    assert_eq!(replicas_of(&deployment), 3);
    assert_eq!(deployment.owner_references()[0].name, "sleeper");

    // Second pass records Created and attaches the finalizer
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::Requeue);
    assert_eq!(store.phases(), vec![Phase::Creating, Phase::Created]);
    let stored = store.workload(&key("sleeper")).unwrap();
    assert!(stored.has_finalizer());
    assert_eq!(stored.phase(), Phase::Created);

    // Third pass finds nothing to do
    store.clear_writes();
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_converged_executer_is_not_written() {
    let store = MemoryStore::new();
    store.insert_workload(executer("idle", 2));
    converge(&store, "idle").await;
    store.clear_writes();

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    for _ in 0..3 {
        assert_eq!(reconcile_key(&ctx, &key("idle")).await.unwrap(), Outcome::Done);
    }
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_scale_down_goes_updating_then_created() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    converge(&store, "sleeper").await;
    store.clear_writes();

    store.edit_workload(&key("sleeper"), |exe| exe.spec.replication = 2);
    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();

    assert_eq!(outcome, Outcome::Done);
    assert_eq!(store.phases(), vec![Phase::Updating, Phase::Created]);
    assert_eq!(
        store.writes(),
        vec![
            Write { op: Op::UpdateStatus, phase: Some(Phase::Updating), replicas: None },
            Write { op: Op::UpdateArtifact, phase: None, replicas: Some(2) },
            Write { op: Op::UpdateStatus, phase: Some(Phase::Created), replicas: None },
        ]
    );
    assert_eq!(replicas_of(&store.artifact(&key("sleeper")).unwrap()), 2);
}

#[tokio::test]
async fn test_scaling_keeps_externally_managed_fields() {
    let store = MemoryStore::new();
    let exe = store.insert_workload(executer("sleeper", 1));
    let mut deployment: Deployment = desired_artifact(&exe).unwrap();
    deployment.metadata.annotations = Some(BTreeMap::from([(
        "deployment.kubernetes.io/revision".to_string(),
        "7".to_string(),
    )]));
    deployment.spec.as_mut().unwrap().replicas = Some(4);
    deployment.spec.as_mut().unwrap().min_ready_seconds = Some(30);
    store.insert_artifact(deployment);

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    reconcile_key(&ctx, &key("sleeper")).await.unwrap();

    let scaled = store.artifact(&key("sleeper")).unwrap();
    assert_eq!(replicas_of(&scaled), 1);
    assert_eq!(scaled.annotations()["deployment.kubernetes.io/revision"], "7");
    assert_eq!(scaled.spec.unwrap().min_ready_seconds, Some(30));
}

#[tokio::test]
async fn test_missing_executer_is_a_no_op() {
    let store = MemoryStore::new();
    let (ctx, _shutdown) = reconciler(Arc::clone(&store));

    let outcome = reconcile_key(&ctx, &key("ghost")).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_deletion_cleans_up_once_then_releases_finalizer() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    converge(&store, "sleeper").await;
    store.clear_writes();

    store.edit_workload(&key("sleeper"), mark_deleted);
    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();

    assert_eq!(outcome, Outcome::Done);
    let ops: Vec<Op> = store.writes().iter().map(|w| w.op).collect();
    assert_eq!(ops, vec![Op::DeleteArtifact, Op::UpdateWorkload]);
    assert!(store.artifact(&key("sleeper")).is_none());
    assert!(store.workload(&key("sleeper")).is_none());

    // Nothing is created or scaled once the Executer is gone
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(store.writes().len(), 2);
}

#[tokio::test]
async fn test_deletion_without_finalizer_does_nothing() {
    let store = MemoryStore::new();
    let mut exe = executer("sleeper", 3);
    mark_deleted(&mut exe);
    exe.metadata.finalizers = Some(vec!["other.example.com/keep".to_string()]);
    store.insert_workload(exe);

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();

    assert_eq!(outcome, Outcome::Done);
    assert!(store.writes().is_empty());
    assert!(store.artifact(&key("sleeper")).is_none());
}

#[tokio::test]
async fn test_deletion_cleanup_failure_keeps_finalizer() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    converge(&store, "sleeper").await;
    store.edit_workload(&key("sleeper"), mark_deleted);
    store.inject(Op::DeleteArtifact, Injected::Failure("etcd timeout".to_string()));

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let err = reconcile_key(&ctx, &key("sleeper")).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Persistence { .. }));
    assert!(store.workload(&key("sleeper")).unwrap().has_finalizer());
}

#[tokio::test]
async fn test_conflicts_requeue_without_marking_failed() {
    for op in [Op::UpdateStatus, Op::CreateArtifact, Op::UpdateWorkload] {
        let store = MemoryStore::new();
        store.insert_workload(executer("sleeper", 3));
        let (ctx, _shutdown) = reconciler(Arc::clone(&store));
        if op == Op::UpdateWorkload {
            // Reach the finalizer write first
            reconcile_key(&ctx, &key("sleeper")).await.unwrap();
        }
        store.inject(op, Injected::Conflict);

        let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
        assert_eq!(outcome, Outcome::RequeueAfter(Duration::from_millis(500)), "{op:?}");
        assert!(!store.phases().contains(&Phase::Failed), "{op:?}");
    }
}

#[tokio::test]
async fn test_scale_conflict_requeues_without_marking_failed() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    converge(&store, "sleeper").await;
    store.clear_writes();
    store.edit_workload(&key("sleeper"), |exe| exe.spec.replication = 5);
    store.inject(Op::UpdateArtifact, Injected::Conflict);

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();

    assert_eq!(outcome, Outcome::RequeueAfter(Duration::from_millis(500)));
    assert_eq!(store.phases(), vec![Phase::Updating]);

    // The retry completes the scale
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(replicas_of(&store.artifact(&key("sleeper")).unwrap()), 5);
}

#[tokio::test]
async fn test_create_failure_marks_failed() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    store.inject(Op::CreateArtifact, Injected::Failure("quota exceeded".to_string()));

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let err = reconcile_key(&ctx, &key("sleeper")).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Persistence { .. }));
    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(store.phases(), vec![Phase::Creating, Phase::Failed]);
    assert_eq!(store.workload(&key("sleeper")).unwrap().phase(), Phase::Failed);
}

#[tokio::test]
async fn test_conflict_on_failed_status_keeps_create_error() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    store.inject(Op::CreateArtifact, Injected::Failure("quota exceeded".to_string()));
    store.inject_after(Op::UpdateStatus, 1, Injected::Conflict);

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let err = reconcile_key(&ctx, &key("sleeper")).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Persistence { .. }));
    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(store.phases(), vec![Phase::Creating]);
}

#[tokio::test]
async fn test_vanished_status_target_requeues_immediately() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    converge(&store, "sleeper").await;
    store.clear_writes();
    store.edit_workload(&key("sleeper"), |exe| exe.spec.replication = 2);
    store.inject(Op::UpdateStatus, Injected::NotFound);

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::Requeue);
    assert!(store.writes().is_empty());

    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(store.phases(), vec![Phase::Updating, Phase::Created]);
    assert_eq!(replicas_of(&store.artifact(&key("sleeper")).unwrap()), 2);
}

#[tokio::test]
async fn test_finalizer_release_conflict_retries_release() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    converge(&store, "sleeper").await;
    store.clear_writes();
    store.edit_workload(&key("sleeper"), mark_deleted);
    store.inject(Op::UpdateWorkload, Injected::Conflict);

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(Duration::from_millis(500)));
    assert!(store.workload(&key("sleeper")).unwrap().has_finalizer());
    assert!(store.artifact(&key("sleeper")).is_none());

    let outcome = reconcile_key(&ctx, &key("sleeper")).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert!(store.workload(&key("sleeper")).is_none());
    assert!(store.artifact(&key("sleeper")).is_none());
    assert_eq!(store.count(Op::CreateArtifact), 0);
    assert_eq!(store.count(Op::UpdateArtifact), 0);
    assert!(store.phases().is_empty());
}

#[tokio::test]
async fn test_scale_failure_marks_failed() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    converge(&store, "sleeper").await;
    store.clear_writes();
    store.edit_workload(&key("sleeper"), |exe| exe.spec.replication = 1);
    store.inject(Op::UpdateArtifact, Injected::Failure("admission denied".to_string()));

    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let err = reconcile_key(&ctx, &key("sleeper")).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Persistence { .. }));
    assert_eq!(store.phases(), vec![Phase::Updating, Phase::Failed]);
}

#[tokio::test]
async fn test_failed_executer_recovers() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    store.inject(Op::CreateArtifact, Injected::Failure("quota exceeded".to_string()));
    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    assert!(reconcile_key(&ctx, &key("sleeper")).await.is_err());

    converge(&store, "sleeper").await;
    assert_eq!(store.workload(&key("sleeper")).unwrap().phase(), Phase::Created);
    assert_eq!(store.count(Op::CreateArtifact), 1);
}

#[tokio::test]
async fn test_shutdown_abandons_in_flight_store_call() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    store.inject(Op::CreateArtifact, Injected::Hang);

    let (ctx, shutdown) = reconciler(Arc::clone(&store));
    let pass = tokio::spawn(async move { reconcile_key(&ctx, &key("sleeper")).await });

    while !store.is_hanging(Op::CreateArtifact) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    shutdown.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), pass)
        .await
        .expect("pass did not observe shutdown")
        .unwrap();
    assert!(matches!(result, Err(ReconcilerError::Cancelled)));
    // No rollback of the status already written
    assert_eq!(store.phases(), vec![Phase::Creating]);
}

#[tokio::test]
async fn test_no_store_call_after_shutdown() {
    let store = MemoryStore::new();
    store.insert_workload(executer("sleeper", 3));
    let (ctx, shutdown) = reconciler(Arc::clone(&store));
    shutdown.send(true).unwrap();

    let result = reconcile_key(&ctx, &key("sleeper")).await;
    assert!(matches!(result, Err(ReconcilerError::Cancelled)));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_reconcile_maps_outcomes_to_actions() {
    let store = MemoryStore::new();
    let exe = store.insert_workload(executer("sleeper", 3));
    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let ctx = Arc::new(ctx);

    let action = reconcile(Arc::new(exe), Arc::clone(&ctx)).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(60)));

    let exe = store.workload(&key("sleeper")).unwrap();
    let action = reconcile(Arc::new(exe), Arc::clone(&ctx)).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::ZERO));

    let exe = store.workload(&key("sleeper")).unwrap();
    let action = reconcile(Arc::new(exe), ctx).await.unwrap();
    assert_eq!(action, Action::await_change());
}

#[tokio::test]
async fn test_error_policy_backs_off_per_resource() {
    let store = MemoryStore::new();
    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let ctx = Arc::new(ctx);
    let error = ReconcilerError::Persistence {
        operation: "create Deployment",
        message: "quota exceeded".to_string(),
    };

    let first = Arc::new(executer("first", 1));
    let second = Arc::new(executer("second", 1));
    let delays: Vec<Action> = (0..4)
        .map(|_| handle_reconciliation_error(Arc::clone(&first), &error, Arc::clone(&ctx)))
        .collect();
    assert_eq!(
        delays,
        [1, 1, 2, 3]
            .map(|s| Action::requeue(Duration::from_secs(s)))
            .to_vec()
    );

    // Another resource starts from the beginning
    let other = handle_reconciliation_error(second, &error, Arc::clone(&ctx));
    assert_eq!(other, Action::requeue(Duration::from_secs(1)));

    // A successful pass resets the sequence
    ctx.reset_backoff(&key("first"));
    let after_reset = handle_reconciliation_error(first, &error, ctx);
    assert_eq!(after_reset, Action::requeue(Duration::from_secs(1)));
}

#[tokio::test]
async fn test_error_policy_does_not_retry_cancelled_passes() {
    let store = MemoryStore::new();
    let (ctx, _shutdown) = reconciler(Arc::clone(&store));
    let action = handle_reconciliation_error(
        Arc::new(executer("sleeper", 1)),
        &ReconcilerError::Cancelled,
        Arc::new(ctx),
    );
    assert_eq!(action, Action::await_change());
}
