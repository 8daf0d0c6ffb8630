//! Error types for flowcoord

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Client input ===
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    // === Authorization ===
    #[error("Access denied: {0}")]
    AuthorizationDenied(String),

    // === Resource state ===
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error(
        "Stale revision for {resource_id}: client expected version {expected}, current version is {current}"
    )]
    StaleRevision {
        resource_id: String,
        expected: u64,
        current: u64,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another mutation held the resource for longer than the lock wait
    #[error("Resource busy: {0}")]
    Busy(String),

    // === Cluster ===
    #[error("No coordinator available: {0}")]
    NoCoordinator(String),

    #[error("Forwarding to coordinator failed: {0}")]
    Forwarding(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Can the client recover by re-reading the resource and retrying?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StaleRevision { .. }
                | Error::PreconditionFailed(_)
                | Error::Conflict(_)
                | Error::Busy(_)
                | Error::Timeout(_)
                | Error::NoCoordinator(_)
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Error::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PreconditionFailed(_) | Error::StaleRevision { .. } | Error::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Error::NoCoordinator(_) | Error::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Forwarding(_) => StatusCode::BAD_GATEWAY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Io(_) | Error::InvalidConfig(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        if status.is_server_error() {
            tracing::error!(status = %status.as_u16(), "{}", self);
        }
        (
            status,
            Json(json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(format!("forward to coordinator: {}", e))
        } else {
            Error::Forwarding(e.to_string())
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::BadRequest("x".into()).to_http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::AuthorizationDenied("x".into()).to_http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::NotFound("x".into()).to_http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::PreconditionFailed("x".into()).to_http_status(),
            StatusCode::CONFLICT
        );
        let stale = Error::StaleRevision {
            resource_id: "p1".into(),
            expected: 5,
            current: 6,
        };
        assert_eq!(stale.to_http_status(), StatusCode::CONFLICT);
        assert!(stale.to_string().contains("expected version 5"));
    }

    #[test]
    fn test_waiting_errors_are_not_client_timeouts() {
        let busy = Error::Busy("p1".into());
        assert_eq!(busy.to_http_status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(busy.is_retryable());
        assert_eq!(
            Error::Timeout("forward".into()).to_http_status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Conflict("x".into()).is_retryable());
        assert!(!Error::AuthorizationDenied("x".into()).is_retryable());
        assert!(!Error::BadRequest("x".into()).is_retryable());
    }
}
