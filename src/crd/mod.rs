//! # Custom Resource Definitions
//!
//! CRD types for the Executer controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - The `Executer` resource and its desired state
//! - `status.rs` - Observed state written by the controller

mod spec;
mod status;

// Re-export all public types
pub use spec::{Executer, ExecuterSpec};
pub use status::{ExecuterStatus, ParsePhaseError, Phase};
