//! Error types for the feed server.
//!
//! [`FeedError`] unifies handler failures into a single enum that converts
//! into a JSON `{error, status}` response via
//! [`IntoResponse`](axum::response::IntoResponse).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the feed's REST layer.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The requested route, bus, or stop does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A query parameter could not be interpreted.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A request body failed validation.
    #[error("invalid body: {0}")]
    InvalidBody(String),
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::InvalidQuery(msg) | Self::InvalidBody(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
