use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::{engine_error, internal_error, not_found, ApiState, ErrorResponse};
use crate::engine::eta::{self, TripSchedule};
use crate::models::local_now;

/// Get one trip projected over its stop sequence
#[utoipa::path(
    get,
    path = "/api/trips/{id}",
    params(
        ("id" = i64, Path, description = "Trip ID")
    ),
    responses(
        (status = 200, description = "Trip with per-stop projected times", body = TripSchedule),
        (status = 404, description = "Trip not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn get_trip(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<TripSchedule>, (StatusCode, Json<ErrorResponse>)> {
    let trip = state
        .store
        .trip(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Trip"))?;

    let route = state
        .store
        .route(trip.route_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route"))?;

    let now = local_now(state.timezone);
    let schedule = eta::trip_schedule(&state.store, &state.resolver, &route, &trip, now)
        .await
        .map_err(engine_error)?;

    Ok(Json(schedule))
}
