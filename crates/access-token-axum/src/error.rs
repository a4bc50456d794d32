use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON body of every response the layer short-circuits with.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status_to_error_code(status),
            message: message.into(),
        }
    }
}

/// Convert a status code to an error code string (e.g., "UNAUTHORIZED").
pub(crate) fn status_to_error_code(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("ERROR")
        .to_uppercase()
        .replace(' ', "_")
}

/// Why the layer refused to call the inner service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    /// The attempt ended in Fail.
    Unauthorized { status: StatusCode, message: String },
    /// The attempt ended in Error, or the strategy is misconfigured.
    Internal(String),
}

impl AuthRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Unauthorized { message, .. } | Self::Internal(message) => message,
        };

        (status, axum::Json(ErrorResponse::from_status(status, message))).into_response()
    }
}
