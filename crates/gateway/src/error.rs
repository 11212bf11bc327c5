//! Gateway error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad JSON or form body. Rejected before auth runs.
    #[error("Malformed request body: {0}")]
    MalformedInput(String),

    #[error("Missing access token")]
    AuthMissing,

    #[error("Access token mismatch")]
    AuthMismatch,

    /// Anything but GET/POST. Answered with 404, not 405.
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::AuthMissing => StatusCode::UNAUTHORIZED,
            GatewayError::AuthMismatch => StatusCode::FORBIDDEN,
            GatewayError::UnsupportedMethod(_) => StatusCode::NOT_FOUND,
            GatewayError::Bind { .. } | GatewayError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Rejections carry a status only, no body.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}
