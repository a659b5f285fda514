//! HTTP mapping for `rb_core::AppError`.
//!
//! Client errors carry `{"message": ...}`. Server errors are logged here and
//! leave with an empty body so no internals reach the client.

use std::fmt;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rb_core::error::AppError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Newtype so the core error can implement actix's `ResponseError`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if !self.0.is_client_error() {
            error!(error = %self.0, "request failed with an internal error");
            return HttpResponse::build(status).finish();
        }
        HttpResponse::build(status).json(ErrorBody {
            message: self.0.to_string(),
        })
    }
}
