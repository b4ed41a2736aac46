//! Error types for the sync core
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Sync Error Enum ==
/// Unified error type for the sync core and its diagnostics surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Cache constructed with a zero capacity
    #[error("Invalid cache capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    /// Cache constructed with a zero TTL
    #[error("Invalid cache TTL: must be a positive number of milliseconds")]
    InvalidTtl,

    /// Reconnect policy that would retry without waiting
    #[error("Invalid reconnect policy: {0}")]
    InvalidPolicy(String),

    /// Remote change-feed could not be opened or dropped mid-stream
    #[error("Change feed error: {0}")]
    Feed(String),

    /// Remote store query or mutation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Caller-supplied refresh rejected
    #[error("Refresh failed: {0}")]
    Refresh(String),

    /// Manager was started while a channel is already live
    #[error("Subscription already running for resource: {0}")]
    AlreadyRunning(String),

    /// Resource or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::InvalidRequest(_)
            | SyncError::InvalidCapacity(_)
            | SyncError::InvalidTtl
            | SyncError::InvalidPolicy(_) => StatusCode::BAD_REQUEST,
            SyncError::AlreadyRunning(_) => StatusCode::CONFLICT,
            SyncError::Feed(_) | SyncError::Store(_) | SyncError::Refresh(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the sync core.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (SyncError::NotFound("calls".into()), StatusCode::NOT_FOUND),
            (SyncError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (SyncError::InvalidCapacity(0), StatusCode::BAD_REQUEST),
            (SyncError::InvalidPolicy("zero delay".into()), StatusCode::BAD_REQUEST),
            (SyncError::AlreadyRunning("calls".into()), StatusCode::CONFLICT),
            (SyncError::Store("down".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            SyncError::InvalidCapacity(0).to_string(),
            "Invalid cache capacity: 0 (must be at least 1)"
        );
        assert!(SyncError::Feed("timeout".into()).to_string().contains("timeout"));
    }
}
