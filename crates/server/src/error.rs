//! HTTP error surface.
//!
//! Workers recover their own transient faults and the orchestrator absorbs
//! worker failures up to the quorum rules, so what reaches a caller is
//! narrow: invalid input, a session that does not exist, or a store that
//! cannot be reached. Each variant carries its status code and a stable
//! machine-readable kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors surfaced by route handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request or order validation failed; nothing was written (400).
    #[error("{0}")]
    BadRequest(String),

    /// No such session, or no simulation registered for it (404).
    #[error("{0}")]
    NotFound(String),

    /// The persistence substrate is unreachable (503).
    #[error("{0}")]
    Unavailable(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Unavailable(_) => "unavailable",
        }
    }
}

/// JSON error body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<store::StoreError> for AppError {
    fn from(err: store::StoreError) -> Self {
        match err {
            store::StoreError::NotFound(msg) => AppError::NotFound(msg),
            store::StoreError::Unavailable(msg) => AppError::Unavailable(msg),
        }
    }
}

impl From<market::MarketError> for AppError {
    fn from(err: market::MarketError) -> Self {
        match err {
            market::MarketError::Store(e) => e.into(),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_variant_declares_its_status() {
        assert_eq!(
            AppError::BadRequest("qty".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("session xyz".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unavailable("store".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_kind_is_stable_per_variant() {
        assert_eq!(AppError::BadRequest("x".into()).kind(), "bad_request");
        assert_eq!(AppError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(AppError::Unavailable("x".into()).kind(), "unavailable");
    }

    #[test]
    fn test_message_passes_through() {
        let err = AppError::NotFound("session xyz".into());
        assert_eq!(err.to_string(), "session xyz");
    }

    #[test]
    fn test_store_error_maps_to_status() {
        let err: AppError = store::StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, AppError::Unavailable(_)));

        let err: AppError = store::StoreError::NotFound("row".into()).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_market_validation_maps_to_bad_request() {
        let err: AppError = market::MarketError::ZeroQuantity.into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
