use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::{engine_error, internal_error, not_found, ApiState, ErrorResponse};
use crate::engine::eta::{self, ArrivalBoard};
use crate::models::{local_now, Stop};

#[derive(Debug, Serialize, ToSchema)]
pub struct StopDetailResponse {
    pub stop: Stop,
    pub route_code: String,
    pub route_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ArrivalsQuery {
    pub limit: Option<usize>,
}

/// Get one stop with its route context
#[utoipa::path(
    get,
    path = "/api/stops/{id}",
    params(
        ("id" = i64, Path, description = "Stop ID")
    ),
    responses(
        (status = 200, description = "Stop detail", body = StopDetailResponse),
        (status = 404, description = "Stop not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn get_stop(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<StopDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let stop = state
        .store
        .stop(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Stop"))?;

    let route = state
        .store
        .route(stop.route_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route"))?;

    Ok(Json(StopDetailResponse {
        stop,
        route_code: route.code,
        route_name: route.name,
    }))
}

/// Arrival board for one stop
#[utoipa::path(
    get,
    path = "/api/stops/{id}/arrivals",
    params(
        ("id" = i64, Path, description = "Stop ID"),
        ("limit" = Option<usize>, Query, description = "Maximum rows, 5-60 (default 20)")
    ),
    responses(
        (status = 200, description = "Upcoming arrivals from persisted trips", body = ArrivalBoard),
        (status = 404, description = "Stop not found", body = ErrorResponse),
        (status = 422, description = "Route data cannot support a schedule", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn get_stop_arrivals(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(query): Query<ArrivalsQuery>,
) -> Result<Json<ArrivalBoard>, (StatusCode, Json<ErrorResponse>)> {
    let stop = state
        .store
        .stop(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Stop"))?;

    let route = state
        .store
        .route(stop.route_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route"))?;

    let now = local_now(state.timezone);
    let board = eta::stop_arrival_board(
        &state.store,
        &state.resolver,
        &route,
        &stop,
        now,
        query.limit,
        state.horizon_minutes,
    )
    .await
    .map_err(engine_error)?;

    Ok(Json(board))
}
