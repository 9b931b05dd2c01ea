//! Upload errors

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Folder name must be 1-64 characters of letters, digits, '-' or '_'")]
    InvalidFolder,

    #[error("Unsupported file type: {0}. Allowed: jpeg, jpg, png, webp")]
    UnsupportedType(String),

    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("No file was uploaded in the 'file' field")]
    MissingFile,

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let status = match &self {
            MediaError::InvalidFolder
            | MediaError::UnsupportedType(_)
            | MediaError::MissingFile
            | MediaError::Multipart(_) => StatusCode::BAD_REQUEST,
            MediaError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            MediaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            MediaError::Io(err) => {
                error!("Failed to store upload: {}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
