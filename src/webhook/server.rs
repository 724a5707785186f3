//! # Admission Server
//!
//! HTTPS endpoint the API server calls before persisting an Executer.
//!
//! Endpoints:
//! - `POST /validate` - Validating admission review
//! - `POST /mutate` - Reserved, answers 501
//! - `POST /convert` - Reserved, answers 501

use crate::config::WebhookServerConfig;
use crate::webhook::gatekeeper::Gatekeeper;
use crate::webhook::request::{decode_review, WebhookError};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use kube::api::DynamicObject;
use kube::core::admission::AdmissionReview;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Time given to in-flight reviews once shutdown starts
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for admission handlers
#[derive(Debug)]
pub struct WebhookState {
    pub gatekeeper: Gatekeeper,
}

impl WebhookState {
    #[must_use]
    pub fn new(gatekeeper: Gatekeeper) -> Self {
        Self { gatekeeper }
    }
}

pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate", post(validate_handler))
        .route("/mutate", post(not_implemented))
        .route("/convert", post(not_implemented))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let request = decode_review(&headers, &body).inspect_err(|e| {
        warn!(error = %e, "Rejected admission review");
    })?;

    match state.gatekeeper.validate(&request) {
        Ok(response) => Ok(Json(response.into_review())),
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to validate resource");
            Err(WebhookError::Validation(e))
        }
    }
}

async fn not_implemented() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}

/// Serve the admission endpoints over TLS until `shutdown` resolves
///
/// # Errors
///
/// Returns an error if the listen address is invalid, the certificate or key
/// cannot be loaded, or the listener fails.
pub async fn serve<F>(
    config: &WebhookServerConfig,
    state: Arc<WebhookState>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid webhook listen address '{}'", config.listen_addr))?;

    let tls_config = RustlsConfig::from_pem_file(&config.tls.certificate, &config.tls.private_key)
        .await
        .with_context(|| {
            format!(
                "Failed to load TLS material from {} and {}",
                config.tls.certificate.display(),
                config.tls.private_key.display()
            )
        })?;

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        info!("Stopping admission server...");
        shutdown_handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
    });

    info!(addr = %addr, "Starting admission webhook server");
    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(router(state).into_make_service())
        .await
        .context("Admission webhook server failed")?;

    info!("Admission webhook server stopped");
    Ok(())
}
