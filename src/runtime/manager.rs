//! # Manager
//!
//! Wires the Kubernetes client, the state store and the reconciler together
//! and hands them to the watch loop.

use crate::controller::reconciler::Reconciler;
use crate::controller::store::KubeStore;
use crate::runtime::initialization::InitializationResult;
use crate::runtime::watch_loop::run_watch_loop;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Run the Executer controller until shutdown
///
/// # Errors
///
/// Fails if no Kubernetes client can be built from the environment.
pub async fn run_manager(init: InitializationResult) -> Result<()> {
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let store = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Arc::new(Reconciler::new(store, &init.config.manager, shutdown_rx));

    init.server_state.set_ready(true);
    info!("Controller initialized, starting watch loop...");

    run_watch_loop(
        client,
        reconciler,
        init.server_state,
        shutdown_tx,
        &init.config.manager,
    )
    .await
}
