//! # Request Decoding
//!
//! Transport-level checks applied before an admission review reaches the
//! gatekeeper. Anything rejected here is answered with HTTP 400 and no
//! validator runs.

use axum::{
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use thiserror::Error;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum WebhookError {
    /// The body is not a usable admission review
    #[error("invalid admission review: {0}")]
    InvalidReview(String),

    /// The gatekeeper could not reach a decision
    #[error("error validating resource")]
    Validation(#[source] crate::webhook::gatekeeper::GatekeeperError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": self.to_string()})),
        )
            .into_response()
    }
}

/// Decode an admission review body into the request it carries
///
/// # Errors
///
/// Returns [`WebhookError::InvalidReview`] if the content type is not JSON,
/// the body is empty or malformed, or the review has no request or no object.
pub fn decode_review(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<AdmissionRequest<DynamicObject>, WebhookError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case(JSON_CONTENT_TYPE) {
        return Err(WebhookError::InvalidReview(format!(
            "content type '{content_type}' is not {JSON_CONTENT_TYPE}"
        )));
    }

    if body.is_empty() {
        return Err(WebhookError::InvalidReview("empty body".to_string()));
    }

    let review: AdmissionReview<DynamicObject> = serde_json::from_slice(body)
        .map_err(|e| WebhookError::InvalidReview(format!("malformed body: {e}")))?;
    let request: AdmissionRequest<DynamicObject> = review
        .try_into()
        .map_err(|e| WebhookError::InvalidReview(format!("{e}")))?;

    if request.object.is_none() {
        return Err(WebhookError::InvalidReview(format!(
            "request {} carries no object",
            request.uid
        )));
    }
    Ok(request)
}
