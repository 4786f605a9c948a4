use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use csvpipe::{ConfigError, CsvPipeError, ErrorKind};

use crate::response::ErrorResponse;

/// Failure of a single request.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] CsvPipeError),

    #[error("Missing x-owner-id header")]
    MissingOwner,

    #[error("{0}")]
    BadRequest(String),

    #[error("Request task failed: {0}")]
    Task(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Service(e) => {
                let kind = e.kind();
                let status = match kind {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Processing | ErrorKind::Storage | ErrorKind::Internal => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, kind.code())
            }
            ApiError::MissingOwner => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::Validation.code()),
            ApiError::Task(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Internal.code(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

/// Failure to bring the server up.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Startup failed: {0}")]
    Startup(#[from] CsvPipeError),

    #[error("Invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(CsvPipeError::validation("bad")),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                ApiError::from(CsvPipeError::not_found("File", "f1")),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (ApiError::MissingOwner, StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (
                ApiError::Task("panicked".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_and_code(), (status, code));
        }
    }
}
