use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JSON body shared by every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    /// Always the literal `"string"`; existing clients expect the key.
    pub fields: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            fields: "string".to_string(),
            message: message.into(),
        }
    }
}

impl AppError {
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::MalformedData(_) => (StatusCode::BAD_REQUEST, "Malformed Data".into()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::PageNotFound => (StatusCode::NOT_FOUND, "Page Not Found".into()),
            AppError::NotDeleted(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Search(_) | AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".into(),
            ),
        }
    }
}

/// API-specific error wrapper that converts AppError into HTTP responses.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!("{self}");
        } else if matches!(self, AppError::MalformedData(_)) {
            tracing::warn!("{self}");
        }

        (status, axum::Json(ErrorBody::new(status, message))).into_response()
    }
}

/// Router fallback for unmatched paths.
pub async fn not_found_handler() -> AppError {
    AppError::PageNotFound
}
