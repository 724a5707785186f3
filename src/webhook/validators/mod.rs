//! # Validators
//!
//! One validator per supported kind. A validator decodes the admitted object
//! into its typed form and registers a reason on the [`Failure`] for every
//! check that does not hold. Checks never stop early, so a single request can
//! report several violations at once.

mod executer;

pub use executer::ExecuterValidator;

use crate::webhook::failure::Failure;
use kube::api::DynamicObject;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("failed to decode {kind} object: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub trait Validator: Send + Sync + std::fmt::Debug {
    /// Run every check against `object`
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Decode`] if the object is not a valid
    /// instance of the validated kind. Failed checks are not errors.
    fn validate(
        &self,
        object: &DynamicObject,
        failure: &mut Failure,
    ) -> Result<(), ValidationError>;
}
