//! # Controller
//!
//! Core controller modules.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks
//! - `store`: State store seam between the reconciler and the API server

pub mod backoff;
pub mod reconciler;
pub mod server;
pub mod store;
