//! Turns handler errors into HTTP responses with a `{"error": message}` body.

use crate::error::{Error, ErrorType};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

/// The HTTP status for each kind of error.
pub fn status(error_type: ErrorType) -> StatusCode {
    match error_type {
        ErrorType::Auth => StatusCode::UNAUTHORIZED,
        ErrorType::Request => StatusCode::BAD_REQUEST,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The error type returned by handlers.
#[derive(Debug)]
pub struct AppError(pub Error);

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn new(error_type: ErrorType, message: impl std::fmt::Display) -> Self {
        Self(Error::msg(error_type, message))
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorType::Auth, "Not authorized")
    }

    pub fn bad_request() -> Self {
        Self::new(ErrorType::Request, "bad request")
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status(self.0.error_type());
        let message = self.0.message();
        if status.is_server_error() {
            error!("{status} {message}: {}", self.0);
        } else {
            warn!("{status} {message}: {}", self.0);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
