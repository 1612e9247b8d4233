use crate::domain::{DomainError, Violation};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::error;

/// One violation as rendered in an error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViolationBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub kind: String,
    pub message: String,
}

impl From<Violation> for ViolationBody {
    fn from(violation: Violation) -> Self {
        Self {
            field: violation.field,
            kind: violation.kind.as_str().to_string(),
            message: violation.message,
        }
    }
}

/// JSON error response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<ViolationBody>,
}

impl ErrorBody {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            operation: None,
            violations: Vec::new(),
        }
    }
}

/// Convert domain error to an HTTP status and body
pub fn domain_error_to_response(err: DomainError) -> (StatusCode, ErrorBody) {
    match err {
        DomainError::ValidationFailed(violations) => {
            let mut body = ErrorBody::new("VALIDATION_FAILED", violations.to_string());
            body.violations = violations.into_iter().map(ViolationBody::from).collect();
            (StatusCode::BAD_REQUEST, body)
        }

        DomainError::DeviceNotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new("NOT_FOUND", msg)),

        DomainError::DeviceAlreadyExists(msg) => (
            StatusCode::CONFLICT,
            ErrorBody::new("ALREADY_EXISTS", format!("device {} already exists", msg)),
        ),

        DomainError::ValidationError(msg) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("VALIDATION_ERROR", msg),
        ),

        DomainError::MalformedRequest(msg) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("MALFORMED_REQUEST", msg),
        ),

        DomainError::PatchFailed { operation, reason } => {
            let mut body = ErrorBody::new("PATCH_FAILED", reason);
            body.operation = operation;
            (StatusCode::BAD_REQUEST, body)
        }

        DomainError::StoreUnavailable(e) => {
            error!(error = %e, "device store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new("STORE_UNAVAILABLE", "device store is unavailable"),
            )
        }

        DomainError::RepositoryError(e) => {
            error!(error = %e, "device store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("INTERNAL", "internal error"),
            )
        }
    }
}

/// Axum-facing wrapper so handlers can return `Result<_, ApiError>` and use `?`
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = domain_error_to_response(self.0);
        (status, Json(body)).into_response()
    }
}
