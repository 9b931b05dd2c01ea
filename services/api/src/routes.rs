//! API service routes

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{MethodRouter, get},
};
use serde_json::json;

use crate::{
    AppState,
    middleware::{auth_middleware, require_moderator},
};

pub mod admin;
pub mod applications;
pub mod catalog;
pub mod profile;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/applications", applications::router(&state))
        .nest("/cars", catalog::car_router(&state))
        .nest("/parts", catalog::part_router(&state))
        .nest("/profile", profile::router(&state))
        .nest("/admin", admin::router(&state))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// Require a signed-in moderator for every method of `route`
pub(crate) fn moderator_only(
    state: &AppState,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route
        .route_layer(middleware::from_fn(require_moderator))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}
