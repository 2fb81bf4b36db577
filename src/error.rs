//! Error types for the publication streamer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
///
/// The HTTP surface only ever emits 200/206/404/500; everything that is not
/// a missing resource maps to 500 with a generic body. Internal detail goes
/// to the log, never across the HTTP boundary.
#[derive(Error, Debug)]
pub enum AppError {
    /// A structured document (encryption manifest, package document) is
    /// present but unparsable. Fatal to that parse attempt only.
    #[error("parse error: {0}")]
    Parse(String),

    /// No parser in the chain both accepted the input and produced a
    /// publication. Fatal to `bind`.
    #[error("no parser accepted the publication")]
    UnsupportedFormat,

    /// The requested path has no corresponding entry in the fetcher.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Underlying I/O or decoding failure while reading a resource.
    #[error("fetch failure: {0}")]
    Fetch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::ResourceNotFound(path) => {
                tracing::debug!("resource not found: {}", path);
                (StatusCode::NOT_FOUND, "not_found", "Not found".to_string())
            }
            AppError::UnsupportedFormat => {
                tracing::error!("unsupported publication format reached a handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "unsupported_format",
                    "Unsupported publication format".to_string(),
                )
            }
            AppError::Parse(msg) => {
                tracing::error!("parse error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "parse_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Fetch(msg) => {
                tracing::error!("fetch failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "fetch_failure",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_resource_maps_to_404() {
        let response = AppError::ResourceNotFound("/x.mp3".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_map_to_500() {
        for err in [
            AppError::Parse("bad xml".into()),
            AppError::UnsupportedFormat,
            AppError::Fetch("disk on fire".into()),
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
