//! Checks applied to `Executer` objects on create and update.

use super::{ValidationError, Validator};
use crate::config::ReplicationBounds;
use crate::crd::Executer;
use crate::webhook::failure::Failure;
use kube::api::DynamicObject;

#[derive(Debug, Clone, Copy)]
pub struct ExecuterValidator {
    bounds: ReplicationBounds,
}

impl ExecuterValidator {
    #[must_use]
    pub fn new(bounds: ReplicationBounds) -> Self {
        Self { bounds }
    }

    fn check_replication(&self, executer: &Executer, failure: &mut Failure) {
        let replication = executer.spec.replication;
        if replication < self.bounds.minimum {
            failure.register_reason(format!(
                "Replication is lower than the minimum value: '{}'",
                self.bounds.minimum
            ));
        } else if replication > self.bounds.maximum {
            failure.register_reason(format!(
                "Replication exceeds the maximum value: '{}'",
                self.bounds.maximum
            ));
        }
    }
}

impl Validator for ExecuterValidator {
    fn validate(
        &self,
        object: &DynamicObject,
        failure: &mut Failure,
    ) -> Result<(), ValidationError> {
        let executer: Executer = serde_json::to_value(object)
            .and_then(serde_json::from_value)
            .map_err(|source| ValidationError::Decode {
                kind: "Executer",
                source,
            })?;

        self.check_replication(&executer, failure);
        Ok(())
    }
}
