// packages/engine/src/utils/errors.rs
//! Engine error types

use crate::simulation::state::Rejection;
use hyper::StatusCode;
use thiserror::Error;

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage failed: {0}")]
    StorageFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server failed: {0}")]
    ServerFailed(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// A simulation command was refused by the state machine
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

impl EngineError {
    /// HTTP status reported when this error reaches the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Rejected(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was caused by the caller rather than the engine
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            EngineError::ValidationFailed("missing".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EngineError::StorageFailed("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(EngineError::NotFound("route".into()).is_client_error());
        assert!(!EngineError::ServerFailed("bind".into()).is_client_error());
    }

    #[test]
    fn test_rejection_is_transparent() {
        let err = EngineError::from(Rejection::ManeuverInProgress);
        assert_eq!(err.to_string(), Rejection::ManeuverInProgress.to_string());
    }
}
