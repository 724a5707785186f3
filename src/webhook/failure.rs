//! # Failure
//!
//! Request-scoped accumulator of denial reasons.

/// Separator placed between reasons in the decision message
const REASON_SEPARATOR: &str = ",";

/// Reasons collected while validating one admission request
///
/// Reasons keep the order in which the checks ran. An empty accumulator
/// means the request is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failure {
    reasons: Vec<String>,
}

impl Failure {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_reason(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.reasons.is_empty()
    }

    /// All reasons joined in registration order
    #[must_use]
    pub fn reason(&self) -> String {
        self.reasons.join(REASON_SEPARATOR)
    }

    #[must_use]
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}
