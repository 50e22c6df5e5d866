//! Input validation middleware and extractors for the lix HTTP API.
//!
//! Provides a `ValidatedJson<T>` extractor that runs `validator` checks
//! after deserialization, plus the field limits and custom validators the
//! request DTOs in `daemon.rs` use.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Body size limit enforced by `tower_http::limit` ahead of this extractor.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Maximum characters accepted in a single analysis request.
pub const MAX_TEXT_LEN: usize = 500_000;
/// Minimum non-whitespace length for a non-empty analysis request.
pub const MIN_TEXT_LEN: usize = 1;
/// Maximum items in one batch request, mirrors [`lix_core::job::MAX_BATCH_ITEMS`].
pub const MAX_BATCH_ITEMS: usize = lix_core::job::MAX_BATCH_ITEMS;
/// Maximum characters in a batch item's id field.
pub const MAX_BATCH_ITEM_ID_LEN: usize = 128;

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.message,
            "error_type": "InvalidInput"
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// A JSON extractor that validates the request body using the `validator`
/// crate after deserializing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ValidationError { message: format!("Invalid JSON: {rejection}") })?;

        value.validate().map_err(|e| ValidationError { message: format!("Validation failed: {e}") })?;

        Ok(ValidatedJson(value))
    }
}

/// Custom validator for analysis text: non-empty after trimming and within
/// the maximum request size.
pub fn validate_text(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut err = validator::ValidationError::new("empty_text");
        err.message = Some("text must not be empty".into());
        return Err(err);
    }
    if value.chars().count() > MAX_TEXT_LEN {
        let mut err = validator::ValidationError::new("text_too_long");
        err.message = Some(format!("text exceeds the maximum of {MAX_TEXT_LEN} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Custom validator for a batch request's item list.
pub fn validate_batch_items(items: &[crate::daemon::BatchItemRequest]) -> Result<(), validator::ValidationError> {
    if items.is_empty() {
        let mut err = validator::ValidationError::new("empty_batch");
        err.message = Some("batch must contain at least one item".into());
        return Err(err);
    }
    if items.len() > MAX_BATCH_ITEMS {
        let mut err = validator::ValidationError::new("batch_too_large");
        err.message = Some(format!("batch exceeds the maximum of {MAX_BATCH_ITEMS} items").into());
        return Err(err);
    }
    Ok(())
}

/// Custom validator for a requested job/batch priority.
pub fn validate_priority(value: i64) -> Result<(), validator::ValidationError> {
    if !(1..=10).contains(&value) {
        let mut err = validator::ValidationError::new("invalid_priority");
        err.message = Some("priority must be between 1 and 10".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_text_rejects_empty() {
        assert!(validate_text("   ").is_err());
        assert!(validate_text("Hei verden").is_ok());
    }

    #[test]
    fn validate_text_rejects_oversized() {
        let huge = "a".repeat(MAX_TEXT_LEN + 1);
        assert!(validate_text(&huge).is_err());
    }

    #[test]
    fn validate_priority_range() {
        assert!(validate_priority(1).is_ok());
        assert!(validate_priority(10).is_ok());
        assert!(validate_priority(0).is_err());
        assert!(validate_priority(11).is_err());
    }
}
