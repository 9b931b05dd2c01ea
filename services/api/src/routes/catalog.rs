//! Catalog endpoints for cars and parts
//!
//! Browsing, filter options and search are public; writes need a
//! moderator.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::WithRejection;
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{
        catalog::{CarInput, CarSearch, FilterQuery, Pagination, PartInput, PartSearch},
        profile::MessageResponse,
    },
    routes::moderator_only,
};

pub fn car_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_cars).merge(moderator_only(state, post(create_car))),
        )
        .route("/filters", get(car_filters))
        .route("/search", post(search_cars))
        .route(
            "/:id",
            get(get_car)
                .merge(moderator_only(state, put(update_car)))
                .merge(moderator_only(state, delete(delete_car))),
        )
}

pub fn part_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_parts).merge(moderator_only(state, post(create_part))),
        )
        .route("/filters", get(part_filters))
        .route("/search", post(search_parts))
        .route(
            "/:id",
            get(get_part)
                .merge(moderator_only(state, put(update_part)))
                .merge(moderator_only(state, delete(delete_part))),
        )
}

fn car_not_found() -> ApiError {
    ApiError::NotFound("Car not found".to_string())
}

fn part_not_found() -> ApiError {
    ApiError::NotFound("Part not found".to_string())
}

pub async fn list_cars(
    State(state): State<AppState>,
    WithRejection(Query(page), _): WithRejection<Query<Pagination>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.cars.list(&page).await?))
}

pub async fn get_car(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let car = state.cars.find(id).await?.ok_or_else(car_not_found)?;
    Ok(Json(car))
}

pub async fn car_filters(
    State(state): State<AppState>,
    WithRejection(Query(selection), _): WithRejection<Query<FilterQuery>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.cars.filter_options(&selection).await?))
}

pub async fn search_cars(
    State(state): State<AppState>,
    WithRejection(Json(search), _): WithRejection<Json<CarSearch>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let filter = search.filter()?;
    Ok(Json(state.cars.search(&filter).await?))
}

pub async fn create_car(
    State(state): State<AppState>,
    WithRejection(Json(fields), _): WithRejection<Json<Map<String, Value>>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let input = CarInput::read(&fields)?;
    let car = state.cars.create(&input).await?;
    Ok((StatusCode::CREATED, Json(car)))
}

pub async fn update_car(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
    WithRejection(Json(fields), _): WithRejection<Json<Map<String, Value>>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let input = CarInput::read(&fields)?;
    let car = state
        .cars
        .update(id, &input)
        .await?
        .ok_or_else(car_not_found)?;
    Ok(Json(car))
}

pub async fn delete_car(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    if !state.cars.delete(id).await? {
        return Err(car_not_found());
    }
    info!("Deleted car {}", id);
    Ok(Json(MessageResponse::new("Car deleted")))
}

pub async fn list_parts(
    State(state): State<AppState>,
    WithRejection(Query(page), _): WithRejection<Query<Pagination>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.parts.list(&page).await?))
}

pub async fn get_part(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let part = state.parts.find(id).await?.ok_or_else(part_not_found)?;
    Ok(Json(part))
}

pub async fn part_filters(
    State(state): State<AppState>,
    WithRejection(Query(selection), _): WithRejection<Query<FilterQuery>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.parts.filter_options(&selection).await?))
}

pub async fn search_parts(
    State(state): State<AppState>,
    WithRejection(Json(search), _): WithRejection<Json<PartSearch>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let filter = search.filter()?;
    Ok(Json(state.parts.search(&filter).await?))
}

pub async fn create_part(
    State(state): State<AppState>,
    WithRejection(Json(fields), _): WithRejection<Json<Map<String, Value>>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let input = PartInput::read(&fields)?;
    let part = state.parts.create(&input).await?;
    Ok((StatusCode::CREATED, Json(part)))
}

pub async fn update_part(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
    WithRejection(Json(fields), _): WithRejection<Json<Map<String, Value>>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let input = PartInput::read(&fields)?;
    let part = state
        .parts
        .update(id, &input)
        .await?
        .ok_or_else(part_not_found)?;
    Ok(Json(part))
}

pub async fn delete_part(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i32>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    if !state.parts.delete(id).await? {
        return Err(part_not_found());
    }
    info!("Deleted part {}", id);
    Ok(Json(MessageResponse::new("Part deleted")))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::send;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_inverted_search_range_is_rejected_before_query() {
        let (status, body) = send(
            "POST",
            "/cars/search",
            None,
            Some(json!({ "year": { "min": 2022, "max": 2010 } })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["invalidFields"], json!(["year"]));
    }

    #[tokio::test]
    async fn test_part_search_validates_price_bounds() {
        let (status, body) = send(
            "POST",
            "/parts/search",
            None,
            Some(json!({ "price_from": "900", "price_to": "100" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["invalidFields"], json!(["price"]));
    }

    #[tokio::test]
    async fn test_extractor_failures_use_error_envelope() {
        let (status, body) = send("GET", "/cars/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));

        let (status, body) = send("POST", "/parts/search", None, Some(json!("cheap"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send("GET", "/cars?limit=many", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_catalog_writes_need_a_token() {
        let (status, _) = send("PUT", "/cars/1", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
