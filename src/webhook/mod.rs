//! # Webhook
//!
//! Validating admission webhook for `Executer` resources.
//!
//! ## Module Structure
//!
//! - `failure.rs` - Accumulates denial reasons
//! - `registry.rs` - Maps requested resources to supported kinds
//! - `validators/` - Per-kind checks
//! - `gatekeeper.rs` - Dispatch and the allow/deny decision
//! - `request.rs` - Transport-level decoding of admission reviews
//! - `server.rs` - TLS axum server

pub mod failure;
pub mod gatekeeper;
pub mod registry;
pub mod request;
pub mod server;
pub mod validators;

pub use failure::Failure;
pub use gatekeeper::{Gatekeeper, GatekeeperError};
pub use registry::{TargetKind, UnsupportedResource};
pub use request::{decode_review, WebhookError};
pub use server::{router, serve, WebhookState};
