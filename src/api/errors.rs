use crate::sheet::SheetError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// API error type with HTTP status code mapping.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// The sheet does not have the shape its layout describes.
    BadGateway(String),
    Internal(String),
    /// Reading a range failed; details are logged, not returned.
    SheetRead(SheetError),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::BadGateway(msg) => write!(f, "Bad gateway: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
            Self::SheetRead(e) => write!(f, "Sheet read error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::SheetRead(e) => {
                tracing::error!(error = %e, "Sheet read failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to read sheet data".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

impl From<SheetError> for ApiError {
    fn from(e: SheetError) -> Self {
        match e {
            SheetError::NoData => Self::NotFound(e.to_string()),
            SheetError::MissingColumn(_) => Self::BadGateway(e.to_string()),
            SheetError::InvalidRange(_) => Self::BadRequest(e.to_string()),
            SheetError::RangeNotFound(_) | SheetError::Read(_) => Self::SheetRead(e),
        }
    }
}
