//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use sanjagh::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, reconcile_key, Outcome, Reconciler, ReconcilerError,
};

// State store seam
pub use crate::controller::store::{KubeStore, ResourceKey, StoreError, WorkloadStore};

// Admission
pub use crate::webhook::{Failure, Gatekeeper, GatekeeperError, TargetKind};

// Config types
pub use crate::config::{Config, ConfigError, ReplicationBounds};
