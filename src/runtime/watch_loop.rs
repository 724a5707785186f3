//! # Watch Loop
//!
//! Runs the `kube_runtime` controller over Executers and the Deployments they own.

use crate::config::ManagerConfig;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::Executer;
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::runtime::signal;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client};
use kube_runtime::{controller::Config as ControllerConfig, watcher, Controller};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn, Instrument};

/// Watch Executers in every namespace until a shutdown signal arrives
///
/// On SIGTERM or SIGINT the process is marked not ready and `shutdown` is
/// raised so that store calls still in flight are abandoned, then the
/// controller stops taking new work.
///
/// # Errors
///
/// Currently infallible; the signature leaves room for startup checks.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    shutdown: watch::Sender<bool>,
    config: &ManagerConfig,
) -> Result<(), anyhow::Error> {
    let executers: Api<Executer> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client);

    // The signal task aborts in-flight store calls first, then lets the
    // controller drain through `stop`.
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let shutdown_state = Arc::clone(&server_state);
    let shutdown_tx = shutdown.clone();
    tokio::spawn(async move {
        let received = signal::termination().await;
        info!(signal = received, "Received shutdown signal, initiating graceful shutdown...");
        shutdown_state.set_ready(false);
        // Receivers live in the reconciler, so sending cannot fail while it runs
        let _ = shutdown_tx.send(true);
        let _ = stop_tx.send(());
        info!("Marked server as not ready, abandoning in-flight store calls");
    });

    let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");
    info!(
        concurrency = config.max_concurrent_reconciles,
        "Starting controller watch loop..."
    );

    Controller::new(executers, watcher::Config::default().any_semantic())
        .owns(deployments, watcher::Config::default())
        .with_config(ControllerConfig::default().concurrency(config.max_concurrent_reconciles))
        .graceful_shutdown_on(async move {
            // A dropped sender means the signal task is gone; keep running
            if stop_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            match result {
                Ok((object, _action)) => debug!(resource = %object, "watch.event.success"),
                Err(e) => warn!(error = %e, "Controller stream error"),
            }
            futures::future::ready(())
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    let _ = shutdown.send(true);
    info!("Controller stopped gracefully");
    Ok(())
}
