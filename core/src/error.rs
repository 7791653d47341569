//! Centralized error types for the DMXX core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the DMXX server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum DmxxError {
    /// Channel index or universe id out of the addressable range.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// A patch would overlap an existing patch in the same universe.
    #[error("Overlapping patch: {0}")]
    OverlappingPatch(String),

    /// A group configuration forms a cycle.
    #[error("Circular group reference: {0}")]
    CircularGroup(String),

    /// More than one mapping table was marked enabled.
    #[error("Invalid mapping configuration: {0}")]
    InvalidMapping(String),

    /// Requested universe does not exist.
    #[error("Universe not found: {0}")]
    UniverseNotFound(String),

    /// Requested scene does not exist.
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    /// Requested group does not exist.
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// Caller's token or password did not validate.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Caller authenticated but lacks the permission for this action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Client sent a malformed or unrecognized command envelope.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A UDP send or bind failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Failure to bind the client protocol port or load the persisted store.
    #[error("Fatal startup error: {0}")]
    Fatal(String),

    /// Configuration failed to load or validate.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Catch-all for conditions that should not occur.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DmxxError {
    /// Returns a machine-readable error code for API responses and client protocol
    /// `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfRange(_) => "out_of_range",
            Self::OverlappingPatch(_) => "overlapping_patch",
            Self::CircularGroup(_) => "circular_group",
            Self::InvalidMapping(_) => "invalid_mapping",
            Self::UniverseNotFound(_) => "universe_not_found",
            Self::SceneNotFound(_) => "scene_not_found",
            Self::GroupNotFound(_) => "group_not_found",
            Self::AuthFailed(_) => "auth_failed",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Network(_) => "network_error",
            Self::Fatal(_) => "fatal_error",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UniverseNotFound(_) | Self::SceneNotFound(_) | Self::GroupNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::OutOfRange(_)
            | Self::OverlappingPatch(_)
            | Self::CircularGroup(_)
            | Self::InvalidMapping(_)
            | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Fatal(_) | Self::Network(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type DmxxResult<T> = Result<T, DmxxError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for DmxxError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_returns_correct_code() {
        let err = DmxxError::OutOfRange("channel 600".into());
        assert_eq!(err.code(), "out_of_range");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn permission_denied_returns_correct_code() {
        let err = DmxxError::PermissionDenied("park".into());
        assert_eq!(err.code(), "permission_denied");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn configuration_error_is_service_unavailable() {
        let err = DmxxError::Configuration("overlapping patches".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
