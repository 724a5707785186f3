//! # Signals
//!
//! Termination signals shared by both commands. Kubernetes stops pods with
//! SIGTERM; SIGINT covers interactive runs.

use tokio::signal::unix::{signal, SignalKind};
use tracing::warn;

/// Resolve once SIGTERM or SIGINT arrives, yielding the signal name
///
/// A signal whose handler cannot be installed is ignored; the other one
/// still triggers shutdown.
pub async fn termination() -> &'static str {
    tokio::select! {
        () = wait_for(SignalKind::terminate(), "SIGTERM") => "SIGTERM",
        () = wait_for(SignalKind::interrupt(), "SIGINT") => "SIGINT",
    }
}

async fn wait_for(kind: SignalKind, name: &'static str) {
    match signal(kind) {
        Ok(mut stream) => {
            if stream.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        Err(e) => {
            warn!(signal = name, error = %e, "Failed to register signal handler");
            std::future::pending::<()>().await;
        }
    }
}
