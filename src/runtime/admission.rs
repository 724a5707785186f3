//! # Admission
//!
//! Runs the validating webhook until shutdown.

use crate::runtime::initialization::InitializationResult;
use crate::runtime::signal;
use crate::webhook::{serve, Gatekeeper, WebhookState};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Serve admission reviews over TLS until SIGTERM or SIGINT
///
/// # Errors
///
/// Fails if the TLS settings are incomplete or the server cannot start.
pub async fn run_webhook(init: InitializationResult) -> Result<()> {
    let server_config = &init.config.webhook.server;
    server_config
        .validate_tls()
        .context("Invalid webhook server configuration")?;

    let validation = &init.config.webhook.validation;
    info!(
        minimum = validation.replication.minimum,
        maximum = validation.replication.maximum,
        "Registered Executer validator"
    );
    let state = Arc::new(WebhookState::new(Gatekeeper::new(validation)));

    let server_state = Arc::clone(&init.server_state);
    let shutdown = async move {
        let received = signal::termination().await;
        info!(signal = received, "Received shutdown signal, initiating graceful shutdown...");
        server_state.set_ready(false);
    };

    init.server_state.set_ready(true);
    serve(server_config, state, shutdown).await
}
