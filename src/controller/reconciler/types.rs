//! # Types
//!
//! Core types for the reconciler.

use crate::config::ManagerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::artifact::ArtifactError;
use crate::controller::reconciler::machine::Failure;
use crate::controller::store::{ResourceKey, WorkloadStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// A write (or read) against the store failed and was not a conflict
    #[error("{operation} failed: {message}")]
    Persistence {
        operation: &'static str,
        message: String,
    },

    #[error("failed to build Deployment: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("reconciliation cancelled by shutdown")]
    Cancelled,

    #[error("invalid transition: {event} while {state}")]
    InvalidTransition { state: String, event: String },
}

impl From<Failure> for ReconcilerError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Store { operation, message } => {
                ReconcilerError::Persistence { operation, message }
            }
            Failure::InvalidTransition { state, event } => {
                ReconcilerError::InvalidTransition { state, event }
            }
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared context handed to every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn WorkloadStore>,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    shutdown: watch::Receiver<bool>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .field("shutting_down", &*self.shutdown.borrow())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler over `store`. Sending `true` on the paired sender
    /// of `shutdown` abandons every in-flight store call.
    pub fn new(
        store: Arc<dyn WorkloadStore>,
        config: &ManagerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            backoff_min_secs: config.error_backoff_min_secs,
            backoff_max_secs: config.error_backoff_max_secs,
            shutdown,
        }
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }

    /// Forget the error history of a resource after a successful pass
    pub fn reset_backoff(&self, key: &ResourceKey) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                if let Some(state) = states.get_mut(&key.to_string()) {
                    state.reset();
                }
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }

    /// Advance the backoff of a resource and return the delay before the next attempt
    /// along with the number of consecutive errors.
    pub fn next_backoff(&self, key: &ResourceKey) -> Option<(u64, u32)> {
        let (min, max) = (self.backoff_min_secs, self.backoff_max_secs);
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(key.to_string())
                    .or_insert_with(|| BackoffState::new(min, max));
                state.increment_error();
                Some((state.backoff.next_backoff_seconds(), state.error_count))
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                None
            }
        }
    }
}
