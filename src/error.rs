/// Unified error types for the ORGiD validator
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the validator
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// A required query parameter is missing or empty
    #[error("{0}")]
    MissingParameter(String),

    /// Token is not a well-formed JWS
    #[error("Invalid JWT: {0}")]
    Decode(String),

    /// Token carries no `iss` claim
    #[error("JWT issuer claim is missing")]
    MissingIssuer,

    /// Resolver could not be reached or answered garbage
    #[error("DID resolution error: {0}")]
    Resolution(String),

    /// Cache store errors (never surfaced to callers)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Body used for 400 responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ParameterErrorResponse {
    pub error: String,
}

/// Body used for every failed verification or lookup
#[derive(Debug, Serialize, Deserialize)]
pub struct FailedResponse {
    pub status: String,
    pub error: String,
}

impl FailedResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: "FAILED".to_string(),
            error: error.into(),
        }
    }
}

/// Convert ValidatorError to HTTP response
impl IntoResponse for ValidatorError {
    fn into_response(self) -> Response {
        match self {
            ValidatorError::MissingParameter(message) => (
                StatusCode::BAD_REQUEST,
                Json(ParameterErrorResponse { error: message }),
            )
                .into_response(),
            ValidatorError::Cache(_) | ValidatorError::Internal(_) | ValidatorError::Config(_) => (
                StatusCode::NOT_FOUND,
                Json(FailedResponse::new("Internal error")), // Don't leak details
            )
                .into_response(),
            other => (
                StatusCode::NOT_FOUND,
                Json(FailedResponse::new(other.to_string())),
            )
                .into_response(),
        }
    }
}

/// Result type alias for validator operations
pub type ValidatorResult<T> = Result<T, ValidatorError>;
