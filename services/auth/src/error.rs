//! Authentication service error type

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{mailer::MailError, password::PasswordError, verification::VerificationError};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address is not verified")]
    EmailNotVerified,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many attempts, try again later")]
    TooManyAttempts,

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            AuthError::EmailNotVerified => (StatusCode::FORBIDDEN, self.to_string()),
            AuthError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AuthError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AuthError::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AuthError::Verification(VerificationError::InvalidCode) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AuthError::Verification(VerificationError::Expired) => {
                (StatusCode::GONE, self.to_string())
            }
            AuthError::Verification(VerificationError::Mail(MailError::Address(_))) => (
                StatusCode::BAD_REQUEST,
                "Email address was rejected".to_string(),
            ),
            AuthError::Verification(VerificationError::Mail(err)) => {
                error!("Mail delivery failed: {}", err);
                (StatusCode::BAD_GATEWAY, "Failed to send email".to_string())
            }
            AuthError::Verification(VerificationError::Database(err))
            | AuthError::Database(err) => {
                error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AuthError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
