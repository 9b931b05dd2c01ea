//! Application endpoints
//!
//! Lookups answer 404 when the id does not exist and 403 when it exists
//! but belongs to someone else. Moderators may read any application but,
//! like everybody else, only change their own.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch},
};
use axum_extra::extract::WithRejection;
use tracing::info;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware, require_moderator},
    models::{
        application::{
            ApplicationDetail, ApplicationHeader, ApplicationRequest, ApplicationStatus,
            CreatedApplication, TransitionError,
        },
        profile::MessageResponse,
    },
};

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_own).post(create_application))
        .route(
            "/all",
            get(list_pending).route_layer(middleware::from_fn(require_moderator)),
        )
        .route(
            "/:id",
            get(get_application)
                .put(update_application)
                .delete(cancel_application),
        )
        .route("/:id/close", patch(close_application))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

/// Load the header of `id` and check the caller may act on it
async fn authorize(
    state: &AppState,
    id: i32,
    user: &AuthUser,
    moderator_allowed: bool,
) -> ApiResult<ApplicationHeader> {
    let header = state
        .applications
        .header(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;

    let permitted = header.user_id == user.id || (moderator_allowed && user.is_moderator());
    if !permitted {
        return Err(ApiError::Forbidden(
            "You do not have access to this application".to_string(),
        ));
    }

    Ok(header)
}

/// Submit a new car or part application
pub async fn create_application(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(payload), _): WithRejection<Json<ApplicationRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let kind = payload.kind()?;
    let detail = ApplicationDetail::read(kind, &payload.fields)?;
    let description = payload.description();

    let id = state
        .applications
        .create(user.id, description.as_deref(), &detail)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedApplication {
            message: "Application created".to_string(),
            application_id: id,
        }),
    ))
}

/// Applications of the caller, newest first
pub async fn list_own(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.applications.list_for_user(user.id).await?;
    Ok(Json(rows))
}

/// Moderation queue of pending applications
pub async fn list_pending(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rows = state.applications.list_pending().await?;
    Ok(Json(rows))
}

pub async fn get_application(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    authorize(&state, id, &user, true).await?;

    let row = state
        .applications
        .find(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;

    Ok(Json(row))
}

/// Replace the description and criteria; the stored type is kept
pub async fn update_application(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<ApplicationRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let header = authorize(&state, id, &user, false).await?;
    let detail = ApplicationDetail::read(header.kind, &payload.fields)?;
    let description = payload.description();

    state
        .applications
        .update(id, description.as_deref(), &detail)
        .await?;

    Ok(Json(MessageResponse::new("Application updated")))
}

async fn transition(
    state: &AppState,
    id: i32,
    user: &AuthUser,
    step: fn(ApplicationStatus) -> Result<ApplicationStatus, TransitionError>,
) -> ApiResult<ApplicationStatus> {
    let header = authorize(state, id, user, false).await?;
    let next = step(header.status)?;

    if !state.applications.transition(id, next).await? {
        // Changed by a concurrent request; report what it is now.
        let current = state
            .applications
            .header(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;
        step(current.status)?;
        return Err(ApiError::Conflict(
            "Application status changed, try again".to_string(),
        ));
    }

    info!("User {} moved application {} to {}", user.id, id, next.as_str());
    Ok(next)
}

/// Owner withdraws a pending application
pub async fn cancel_application(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    transition(&state, id, &user, ApplicationStatus::cancel).await?;
    Ok(Json(MessageResponse::new("Application cancelled")))
}

/// Owner marks a pending application as fulfilled
pub async fn close_application(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    transition(&state, id, &user, ApplicationStatus::close).await?;
    Ok(Json(MessageResponse::new("Application closed")))
}
