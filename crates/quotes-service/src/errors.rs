//! Quotes service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! returned to clients are generic; the underlying cause is logged
//! server-side at the component boundary that produced the error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Quotes service error type.
///
/// Maps to HTTP status codes:
/// - TokenInvalid, AccessDenied: 401 Unauthorized (with `WWW-Authenticate`)
/// - Forbidden: 403 Forbidden
/// - UserNotFound, GroupNotFound: 404 Not Found
/// - ResourceAlreadyExists: 409 Conflict
/// - BadRequest: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QsError {
    #[error("The access token is invalid or expired")]
    TokenInvalid,

    #[error("Access denied")]
    AccessDenied,

    #[error("Forbidden")]
    Forbidden,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl QsError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            QsError::TokenInvalid | QsError::AccessDenied => 401,
            QsError::Forbidden => 403,
            QsError::UserNotFound(_) | QsError::GroupNotFound(_) => 404,
            QsError::ResourceAlreadyExists(_) => 409,
            QsError::BadRequest(_) => 400,
            QsError::ServiceUnavailable(_) => 503,
            QsError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for QsError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            QsError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                "The access token is invalid or expired".to_string(),
            ),
            QsError::AccessDenied => (
                StatusCode::UNAUTHORIZED,
                "ACCESS_DENIED",
                "Access denied".to_string(),
            ),
            QsError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You are not a member of this group".to_string(),
            ),
            QsError::UserNotFound(what) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND", what.clone()),
            QsError::GroupNotFound(what) => {
                (StatusCode::NOT_FOUND, "GROUP_NOT_FOUND", what.clone())
            }
            QsError::ResourceAlreadyExists(what) => {
                (StatusCode::CONFLICT, "RESOURCE_ALREADY_EXISTS", what.clone())
            }
            QsError::BadRequest(reason) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone()),
            QsError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "qs.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            QsError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"quotes-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
