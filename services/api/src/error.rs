//! Custom error types for the API service

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{mailer::MailError, password::PasswordError, verification::VerificationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::application::TransitionError;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request with message
    #[error("{0}")]
    BadRequest(String),

    /// One or more fields are absent or malformed
    #[error("{message}")]
    Validation {
        message: String,
        missing_fields: Vec<String>,
        invalid_fields: Vec<String>,
    },

    /// Missing, invalid or orphaned credential
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many attempts, try again later")]
    TooManyAttempts,

    /// Lifecycle transition refused by the current status
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Mail(#[from] MailError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn mail_status(err: &MailError) -> (StatusCode, String) {
    match err {
        MailError::Address(msg) => (
            StatusCode::BAD_REQUEST,
            format!("Invalid email address: {}", msg),
        ),
        other => {
            error!("Mail delivery failed: {}", other);
            (StatusCode::BAD_GATEWAY, "Failed to send email".to_string())
        }
    }
}

fn internal(cause: &dyn std::fmt::Display) -> (StatusCode, String) {
    error!("Request failed: {}", cause);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Validation {
                message,
                missing_fields,
                invalid_fields,
            } => {
                let body = Json(json!({
                    "error": message,
                    "missingFields": missing_fields,
                    "invalidFields": invalid_fields,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            err @ ApiError::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
            ApiError::Transition(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Verification(err @ VerificationError::InvalidCode) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Verification(err @ VerificationError::Expired) => {
                (StatusCode::GONE, err.to_string())
            }
            ApiError::Verification(VerificationError::Mail(err)) | ApiError::Mail(err) => {
                mail_status(&err)
            }
            ApiError::Verification(VerificationError::Database(err)) | ApiError::Database(err) => {
                internal(&err)
            }
            ApiError::Internal(msg) => internal(&msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_lists_fields() {
        let (status, body) = body_json(ApiError::Validation {
            message: "Missing required fields: brand_car".to_string(),
            missing_fields: vec!["brand_car".to_string()],
            invalid_fields: vec![],
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["missingFields"], json!(["brand_car"]));
        assert_eq!(body["invalidFields"], json!([]));
    }

    #[tokio::test]
    async fn test_expired_code_is_distinct_from_wrong_code() {
        let (expired, expired_body) =
            body_json(ApiError::Verification(VerificationError::Expired)).await;
        let (wrong, wrong_body) =
            body_json(ApiError::Verification(VerificationError::InvalidCode)).await;

        assert_eq!(expired, StatusCode::GONE);
        assert_eq!(wrong, StatusCode::BAD_REQUEST);
        assert_ne!(expired_body["error"], wrong_body["error"]);
    }

    #[tokio::test]
    async fn test_dependency_failures_hide_cause() {
        let (status, body) = body_json(ApiError::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let (status, _) = body_json(ApiError::Mail(MailError::Send("refused".into()))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_too_many_attempts() {
        let (status, body) = body_json(ApiError::TooManyAttempts).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Too many attempts, try again later");
    }
}
