//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use accountant_core::errors::{DatabaseError, Error, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(ValidationError::UnknownTable(table)) => {
                ApiError::BadRequest(format!("Unknown table: {}", table))
            }
            Error::Validation(err) => ApiError::Validation(err.to_string()),
            Error::NotFound(_) | Error::Database(DatabaseError::NotFound(_)) => {
                ApiError::NotFound(err.to_string())
            }
            other => {
                tracing::error!("Request failed: {}", other);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
            code: self.error_code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (
                Error::Validation(ValidationError::invalid_field("period_length", "must be at least 1")),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                Error::Validation(ValidationError::UnknownTable("users".into())),
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
            ),
            (Error::not_found("Wallet"), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                Error::Database(DatabaseError::NotFound("row".into())),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                Error::Database(DatabaseError::QueryFailed("disk I/O".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status_code(), status);
            assert_eq!(api.error_code(), code);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let api = ApiError::from(Error::Unexpected("secret path /var/db".into()));
        assert_eq!(api.to_string(), "Internal server error");
    }

    #[test]
    fn not_found_names_the_resource() {
        let api = ApiError::from(Error::not_found("Recurring config"));
        assert_eq!(api.to_string(), "Recurring config not found");
    }
}
