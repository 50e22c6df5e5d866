//! Error types for the readability service.

use thiserror::Error;

/// Error kinds surfaced across the analysis engine and its adapters.
///
/// These map onto the error kinds in the external interface contract:
/// `InvalidInput`, `ModelUnavailable`, `DependencyUnavailable`, `CircuitOpen`,
/// `ProcessingError`, `NotFound`, `Transient`.
#[derive(Error, Debug)]
pub enum LixError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("circuit open: {0}")]
    CircuitOpen(String),

    #[error("processing error: {0}")]
    ProcessingError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LixError {
    /// The error kind name as it appears on the wire (bus replies, HTTP error bodies).
    pub fn kind(&self) -> &'static str {
        match self {
            LixError::InvalidInput(_) => "InvalidInput",
            LixError::ModelUnavailable(_) => "ModelUnavailable",
            LixError::DependencyUnavailable(_) => "DependencyUnavailable",
            LixError::CircuitOpen(_) => "CircuitOpen",
            LixError::ProcessingError(_) => "ProcessingError",
            LixError::NotFound(_) => "NotFound",
            LixError::Transient(_) => "Transient",
            LixError::Serialization(_) => "ProcessingError",
            LixError::Io(_) => "Transient",
        }
    }

    /// Whether this error class is eligible for local bounded retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LixError::DependencyUnavailable(_) | LixError::Transient(_)
        )
    }
}

/// Result type alias for readability-service operations.
pub type Result<T> = std::result::Result<T, LixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_wire_contract() {
        assert_eq!(LixError::InvalidInput("x".into()).kind(), "InvalidInput");
        assert_eq!(LixError::CircuitOpen("x".into()).kind(), "CircuitOpen");
        assert_eq!(LixError::NotFound("x".into()).kind(), "NotFound");
    }

    #[test]
    fn retryable_classes() {
        assert!(LixError::DependencyUnavailable("x".into()).is_retryable());
        assert!(LixError::Transient("x".into()).is_retryable());
        assert!(!LixError::InvalidInput("x".into()).is_retryable());
        assert!(!LixError::CircuitOpen("x".into()).is_retryable());
    }
}
