//! # Runtime
//!
//! Process wiring for the two commands.
//!
//! - `initialization.rs` - Shared startup
//! - `manager.rs` / `watch_loop.rs` / `error_policy.rs` - The Executer controller
//! - `admission.rs` - The validating webhook
//! - `signal.rs` - SIGTERM/SIGINT handling shared by both

pub mod admission;
pub mod error_policy;
pub mod initialization;
pub mod manager;
pub mod signal;
pub mod watch_loop;

pub use admission::run_webhook;
pub use initialization::{initialize, InitializationResult, Role};
pub use manager::run_manager;
