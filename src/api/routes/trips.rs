use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::api::{engine_error, internal_error, not_found, ApiState, ErrorResponse};
use crate::engine::trips::{self, UpcomingTrip};
use crate::engine::EngineError;
use crate::models::local_now;

const DEFAULT_LISTING_LIMIT: usize = 12;
const MIN_LISTING_LIMIT: usize = 1;
const MAX_LISTING_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpcomingTripsResponse {
    pub route_id: i64,
    pub count: usize,
    pub items: Vec<UpcomingTrip>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateTripsRequest {
    /// Forward horizon in minutes, clamped to [30, 1440]; defaults to the
    /// configured engine horizon
    pub horizon_minutes: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateTripsResponse {
    pub route_id: i64,
    pub service_date: String,
    /// Rows actually written; zero when the grid was already persisted
    pub inserted: u32,
}

/// List today's upcoming departures for a route
#[utoipa::path(
    get,
    path = "/api/routes/{id}/trips",
    params(
        ("id" = i64, Path, description = "Route ID"),
        ("limit" = Option<usize>, Query, description = "Maximum rows, 1-50 (default 12)")
    ),
    responses(
        (status = 200, description = "Not-yet-departed trips, soonest first", body = UpcomingTripsResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_trips(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<UpcomingTripsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let route = state
        .store
        .route(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route"))?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LISTING_LIMIT)
        .clamp(MIN_LISTING_LIMIT, MAX_LISTING_LIMIT);
    let now = local_now(state.timezone);

    // Top up the table first. A route that cannot be scheduled yet still
    // lists whatever rows it has, only database faults abort the listing.
    if let Err(e) = trips::ensure_upcoming_trips(&state.store, &route, now, state.horizon_minutes).await
    {
        match e {
            EngineError::Database(_) => return Err(internal_error(e)),
            condition => {
                debug!(route = %route.code, reason = %condition, "Listing without generation")
            }
        }
    }

    let date = now.date().format("%Y-%m-%d").to_string();
    let today = state
        .store
        .trips_for_date(route.id, &date)
        .await
        .map_err(internal_error)?;
    let items = trips::upcoming_trip_rows(&today, now, limit);

    Ok(Json(UpcomingTripsResponse {
        route_id: route.id,
        count: items.len(),
        items,
    }))
}

/// Generate upcoming trips for a route on demand
#[utoipa::path(
    post,
    path = "/api/routes/{id}/trips/generate",
    request_body = GenerateTripsRequest,
    params(
        ("id" = i64, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Generation outcome", body = GenerateTripsResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 422, description = "Route data cannot support a schedule", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn generate_route_trips(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(request): Json<GenerateTripsRequest>,
) -> Result<Json<GenerateTripsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let route = state
        .store
        .route(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route"))?;

    let horizon = request.horizon_minutes.unwrap_or(state.horizon_minutes);
    let now = local_now(state.timezone);

    let inserted = trips::ensure_upcoming_trips(&state.store, &route, now, horizon)
        .await
        .map_err(engine_error)?;

    Ok(Json(GenerateTripsResponse {
        route_id: route.id,
        service_date: now.date().format("%Y-%m-%d").to_string(),
        inserted,
    }))
}
