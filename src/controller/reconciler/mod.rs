//! # Reconciler
//!
//! Core reconciliation logic for `Executer` resources.
//!
//! The reconciler:
//! - Watches `Executer` resources and their owned Deployments across all namespaces
//! - Creates the Deployment when it is missing and scales it when the replica count drifts
//! - Records progress in `status.phase`
//! - Guards deletion with a finalizer and removes the Deployment explicitly
//!
//! ## Module Structure
//!
//! - `artifact.rs` - Executer to Deployment mapping
//! - `machine.rs` - Pure reconcile state machine
//! - `reconcile.rs` - Executor driving the machine against the store
//! - `types.rs` - Context and error types

pub mod artifact;
pub mod machine;
pub mod reconcile;
pub mod types;

// Re-export public API
pub use artifact::{desired_artifact, labels, replicas_of, ArtifactError};
pub use machine::Outcome;
pub use reconcile::{reconcile, reconcile_key};
pub use types::{BackoffState, Reconciler, ReconcilerError};
