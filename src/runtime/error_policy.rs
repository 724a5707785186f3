//! # Error Policy
//!
//! Retry scheduling for failed reconciliations.

use crate::constants::DEFAULT_ERROR_BACKOFF_MAX_SECS;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::controller::store::ResourceKey;
use crate::crd::Executer;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Requeue a failed Executer with per-resource Fibonacci backoff
///
/// Each resource keeps its own error count so one broken Executer never
/// slows down the retries of another. A pass abandoned on shutdown is not
/// counted as an error.
pub fn handle_reconciliation_error(
    executer: Arc<Executer>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = ResourceKey::from_resource(executer.as_ref());

    if matches!(error, ReconcilerError::Cancelled) {
        info!(resource = %key, "Reconciliation cancelled by shutdown");
        return Action::await_change();
    }

    let error_span = tracing::error_span!(
        "controller.watch.reconciliation_error",
        resource.name = key.name.as_str(),
        resource.namespace = key.namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {:?}", key, error);
    observability::metrics::increment_reconciliation_errors();

    // A poisoned lock falls back to the ceiling rather than hammering the API server
    let (backoff_seconds, error_count) = ctx
        .next_backoff(&key)
        .unwrap_or((DEFAULT_ERROR_BACKOFF_MAX_SECS, 0));

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));
    info!(
        resource = %key,
        backoff_seconds,
        error_count,
        next_retry = %next_trigger_time.to_rfc3339(),
        "Retrying with Fibonacci backoff"
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}
