//! Media service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::{error::MediaError, storage::DiskStorage};

/// Multipart framing allowance on top of the file limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub folder: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Create the router for the media service
pub fn create_router(storage: DiskStorage) -> Router {
    let body_limit = storage.max_bytes() + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest_service("/uploads", ServeDir::new(storage.root()))
        .with_state(storage)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "media-service"
    }))
}

fn multipart_error(err: MultipartError, limit: usize) -> MediaError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        MediaError::TooLarge { limit }
    } else {
        MediaError::Multipart(err.body_text())
    }
}

/// Store the image sent in the `file` field under `?folder=`
pub async fn upload(
    State(storage): State<DiskStorage>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, MediaError> {
    let limit = storage.max_bytes();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        let stored = storage
            .store(&query.folder, &file_name, &content_type, &bytes)
            .await?;

        return Ok(Json(UploadResponse { url: stored.url() }));
    }

    Err(MediaError::MissingFile)
}
