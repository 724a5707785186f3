//! # Initialization
//!
//! Startup shared by the `manager` and `webhook` commands: rustls setup,
//! configuration, tracing, metrics and the management HTTP server.

use crate::config::{self, Config};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Which process is starting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Manager,
    Webhook,
}

impl Role {
    /// Port of the metrics and probe server for this role
    #[must_use]
    pub fn management_port(self, config: &Config) -> u16 {
        match self {
            Self::Manager => config.manager.metrics_port,
            Self::Webhook => config.webhook.server.management_port,
        }
    }
}

/// Everything a command needs once startup has finished
pub struct InitializationResult {
    pub config: Config,
    /// Readiness flag served on `/readyz`
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the process runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Configuration loading and validation
/// - Tracing subscriber setup
/// - Metrics registration
/// - Management server startup
///
/// # Errors
///
/// Fails if the configuration is invalid, the tracing subscriber or metrics
/// cannot be installed, or the management server does not come up in time.
pub async fn initialize(config_path: Option<PathBuf>, role: Role) -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection or listener
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    let path = config::resolve_config_path(config_path, config::running_inside_pod());
    let config = Config::load(path.as_deref()).context("Failed to load configuration")?;

    observability::init_tracing(&config.logger)?;

    info!(role = ?role, "Starting sanjagh");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        config_file = ?path,
        config = ?config,
        "Loaded configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let bound = Arc::new(AtomicBool::new(false));
    let port = role.management_port(&config);

    let server_handle = {
        let state = Arc::clone(&server_state);
        let bound = Arc::clone(&bound);
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, bound).await {
                error!("HTTP server error: {}", e);
            }
        })
    };

    wait_for_server_ready(
        &bound,
        &server_handle,
        config.manager.server_startup_timeout(),
        config.manager.server_poll_interval(),
    )
    .await?;

    Ok(InitializationResult {
        config,
        server_state,
    })
}

/// Wait until the management server has bound its port
async fn wait_for_server_ready(
    bound: &AtomicBool,
    server_handle: &tokio::task::JoinHandle<()>,
    startup_timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if bound.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
