//! Moderator tools

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use axum_extra::extract::WithRejection;
use common::{mailer::Email, validation::validate_email};
use tracing::info;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::profile::{MessageResponse, SendEmailRequest},
    routes::moderator_only,
};

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().route("/send-email", moderator_only(state, post(send_email)))
}

/// Send a reply to a customer from the shop mailbox
pub async fn send_email(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<SendEmailRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::Validation {
            message: format!("Missing required fields: {}", missing.join(", ")),
            missing_fields: missing,
            invalid_fields: Vec::new(),
        });
    }

    let to = payload.to.trim().to_string();
    validate_email(&to).map_err(ApiError::BadRequest)?;

    state
        .mailer
        .send(Email {
            to: to.clone(),
            subject: payload.subject.trim().to_string(),
            body: payload.text,
        })
        .await?;

    info!("Moderator email sent to {}", to);
    Ok(Json(MessageResponse::new("Email sent")))
}
