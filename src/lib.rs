//! Sanjagh Library
//!
//! Reconciles `Executer` custom resources into Deployments and validates
//! them at admission time.
//!
//! ## Quick Start
//!
//! ```rust
//! use sanjagh::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod webhook;
