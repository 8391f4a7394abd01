//! Response types for the payroll engine API.
//!
//! This module defines the error response structures and the mapping from
//! engine errors to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates a missing actor error response.
    pub fn missing_actor() -> Self {
        Self::with_details(
            "MISSING_ACTOR",
            "missing or invalid x-actor-id header",
            "Mutating requests must carry the id of the authorized actor",
        )
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    /// A 500 response for failures outside the engine.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::new("INTERNAL_ERROR", message),
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let status = match &error {
            EngineError::ConfigNotFound { .. }
            | EngineError::ConfigParseError { .. }
            | EngineError::VersioningInvariantViolation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::InvalidConfiguration { .. } => StatusCode::BAD_REQUEST,
            EngineError::PayrollNotFound { .. } | EngineError::PayrollDateNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            EngineError::DuplicateDate { .. }
            | EngineError::AssignmentConflict { .. }
            | EngineError::StaleAssignment { .. }
            | EngineError::AssignmentUnchanged { .. }
            | EngineError::VersionNotCurrent { .. }
            | EngineError::VersionNotDraft { .. }
            | EngineError::StaleVersion { .. }
            | EngineError::PendingDraft { .. } => StatusCode::CONFLICT,
            EngineError::NoBackupConsultant { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        };

        let error = match &error {
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                ApiError::with_details("CONFIG_ERROR", "Configuration error", error.to_string())
            }
            EngineError::VersioningInvariantViolation { .. } => ApiError::with_details(
                error.code(),
                error.to_string(),
                "The payroll family needs manual correction before it can change",
            ),
            _ => ApiError::new(error.code(), error.to_string()),
        };

        ApiErrorResponse { status, error }
    }
}
