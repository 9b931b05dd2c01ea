//! Profile endpoints of the signed-in user

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use common::{
    password::{hash_password, verify_password},
    validation::{normalize_email, validate_email, validate_name, validate_password},
    verification::CodePurpose,
};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::profile::{
        AvatarRequest, ChangeEmailRequest, ChangePasswordRequest, MessageResponse, Profile,
        UpdateProfileRequest,
    },
    repositories::is_unique_violation,
    routes::moderator_only,
};

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/avatar", put(update_avatar))
        .route("/request-email-change", post(request_email_change))
        .route("/email", put(change_email))
        .route("/password", put(change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route("/:id", moderator_only(state, get(get_user_profile)))
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

async fn load_profile(state: &AppState, id: i32) -> ApiResult<Profile> {
    state
        .users
        .find_profile(id)
        .await?
        .ok_or_else(user_not_found)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(load_profile(&state, user.id).await?))
}

/// Any user's profile, for moderators
pub async fn get_user_profile(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(load_profile(&state, id).await?))
}

/// Count an attempt at `action` for `user_id`; the key is returned so a
/// success can reset it
async fn throttle(state: &AppState, action: &str, user_id: i32) -> ApiResult<String> {
    let key = format!("{}:{}", action, user_id);
    if !state.rate_limiter.check(&key).await {
        warn!("Throttled {} for user {}", action, user_id);
        return Err(ApiError::TooManyAttempts);
    }
    Ok(key)
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim)
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let first_name = trimmed(&payload.first_name);
    let last_name = trimmed(&payload.last_name);
    if let Some(name) = first_name {
        validate_name("first_name", name).map_err(ApiError::BadRequest)?;
    }
    if let Some(name) = last_name {
        validate_name("last_name", name).map_err(ApiError::BadRequest)?;
    }

    let profile = state
        .users
        .update_profile(user.id, first_name, last_name, trimmed(&payload.photo_url))
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(profile))
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(payload), _): WithRejection<Json<AvatarRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let photo_url = payload.photo_url.trim();
    if photo_url.is_empty() {
        return Err(ApiError::BadRequest("photo_url is required".to_string()));
    }

    let profile = state
        .users
        .update_profile(user.id, None, None, Some(photo_url))
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(profile))
}

/// Mail a confirmation code to the current address
pub async fn request_email_change(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    throttle(&state, "email-change-request", user.id).await?;
    let profile = load_profile(&state, user.id).await?;

    let mut tx = state.db_pool.begin().await?;
    state
        .verification
        .issue(&mut tx, &profile.email, CodePurpose::EmailChange)
        .await?;
    tx.commit().await?;

    Ok(Json(MessageResponse::new(
        "Confirmation code sent to your current email",
    )))
}

/// Swap the email once the code sent to the current address is confirmed
pub async fn change_email(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(payload), _): WithRejection<Json<ChangeEmailRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let new_email = normalize_email(&payload.new_email);
    validate_email(&new_email).map_err(ApiError::BadRequest)?;
    if payload.code.trim().is_empty() {
        return Err(ApiError::BadRequest("Confirmation code is required".to_string()));
    }
    let key = throttle(&state, "email-change", user.id).await?;

    let profile = load_profile(&state, user.id).await?;
    if profile.email == new_email {
        return Err(ApiError::BadRequest(
            "New email matches the current one".to_string(),
        ));
    }
    if state.users.email_taken(&new_email, user.id).await? {
        return Err(ApiError::Conflict("Email is already in use".to_string()));
    }

    let mut tx = state.db_pool.begin().await?;
    state
        .verification
        .verify(&mut tx, &profile.email, &payload.code)
        .await?;
    state
        .users
        .set_email(&mut tx, user.id, &new_email)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("Email is already in use".to_string())
            } else {
                ApiError::Database(e)
            }
        })?;
    state.verification.consume(&mut tx, &profile.email).await?;
    tx.commit().await?;
    state.rate_limiter.reset(&key).await;

    info!("User {} changed email", user.id);
    Ok(Json(MessageResponse::new("Email updated")))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(payload), _): WithRejection<Json<ChangePasswordRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    if payload.current_password.is_empty() {
        return Err(ApiError::BadRequest(
            "Current password is required".to_string(),
        ));
    }
    validate_password(&payload.new_password).map_err(ApiError::BadRequest)?;

    let current_hash = state
        .users
        .password_hash(user.id)
        .await?
        .ok_or_else(user_not_found)?;
    if !verify_password(&payload.current_password, &current_hash)? {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password(&payload.new_password)?;
    state.users.set_password(user.id, &new_hash).await?;

    Ok(Json(MessageResponse::new("Password updated")))
}
