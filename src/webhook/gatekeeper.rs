//! # Gatekeeper
//!
//! Turns an admission request into an allow or deny decision.
//!
//! 1. Resolve the requested resource to a registered validator
//! 2. Allow objects that are already being deleted without running any check
//! 3. Run the validator and collect every failed check
//! 4. Allow when nothing failed, otherwise deny with the joined reasons

use crate::config::ValidationConfig;
use crate::observability;
use crate::webhook::failure::Failure;
use crate::webhook::registry::{TargetKind, UnsupportedResource};
use crate::webhook::validators::{ExecuterValidator, ValidationError, Validator};
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Failures that prevent a decision from being made
///
/// A denied request is not an error; it is an [`AdmissionResponse`] with
/// `allowed = false`.
#[derive(Debug, Error)]
pub enum GatekeeperError {
    #[error(transparent)]
    UnsupportedResource(#[from] UnsupportedResource),

    #[error("no validator registered for {kind}")]
    NoValidator { kind: TargetKind },

    #[error("admission request {uid} carries no object")]
    MissingObject { uid: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Default)]
pub struct Gatekeeper {
    validators: HashMap<TargetKind, Box<dyn Validator>>,
}

impl Gatekeeper {
    /// Gatekeeper with every built-in validator registered
    #[must_use]
    pub fn new(validation: &ValidationConfig) -> Self {
        let mut gatekeeper = Self::default();
        gatekeeper.register(
            TargetKind::Executers,
            ExecuterValidator::new(validation.replication),
        );
        gatekeeper
    }

    /// Register `validator` for `kind`, replacing any previous one
    pub fn register(&mut self, kind: TargetKind, validator: impl Validator + 'static) {
        self.validators.insert(kind, Box::new(validator));
    }

    /// Decide whether the write described by `request` may proceed
    ///
    /// # Errors
    ///
    /// - [`GatekeeperError::UnsupportedResource`] if the resource has no known kind
    /// - [`GatekeeperError::NoValidator`] if the kind is known but nothing is registered for it
    /// - [`GatekeeperError::MissingObject`] if the request has no object
    /// - [`GatekeeperError::Validation`] if the object cannot be decoded
    pub fn validate(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<AdmissionResponse, GatekeeperError> {
        let start = Instant::now();
        let result = self.decide(request);
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok((kind, decision, _)) => {
                observability::metrics::record_admission_review(kind.as_str(), decision, elapsed);
            }
            Err(_) => {
                let kind = TargetKind::resolve(&request.resource)
                    .map_or("unsupported", |kind| kind.as_str());
                observability::metrics::record_admission_review(kind, "error", elapsed);
            }
        }
        result.map(|(_, _, response)| response)
    }

    fn decide(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<(TargetKind, &'static str, AdmissionResponse), GatekeeperError> {
        let kind = TargetKind::resolve(&request.resource)?;
        let validator = self
            .validators
            .get(&kind)
            .ok_or(GatekeeperError::NoValidator { kind })?;
        let object = request
            .object
            .as_ref()
            .ok_or_else(|| GatekeeperError::MissingObject {
                uid: request.uid.clone(),
            })?;

        if object.metadata.deletion_timestamp.is_some() {
            debug!(
                uid = %request.uid,
                kind = %kind,
                "Object is being deleted, skipping validation"
            );
            return Ok((kind, "bypassed", AdmissionResponse::from(request)));
        }

        let mut failure = Failure::new();
        validator.validate(object, &mut failure)?;

        if failure.is_allowed() {
            debug!(
                uid = %request.uid,
                kind = %kind,
                name = ?object.metadata.name,
                "Admission allowed"
            );
            Ok((kind, "allowed", AdmissionResponse::from(request)))
        } else {
            let reason = failure.reason();
            info!(
                uid = %request.uid,
                kind = %kind,
                name = ?object.metadata.name,
                namespace = ?object.metadata.namespace,
                reason = %reason,
                "Admission denied"
            );
            Ok((kind, "denied", AdmissionResponse::from(request).deny(reason)))
        }
    }
}
