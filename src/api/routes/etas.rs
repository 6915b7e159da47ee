use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::{engine_error, internal_error, not_found, ApiState, ErrorResponse};
use crate::engine::eta::{self, RouteEtas};
use crate::engine::OffsetSource;
use crate::models::{local_now, Direction};

#[derive(Debug, Deserialize)]
pub struct EtasQuery {
    pub direction: Option<String>,
    /// Local reference instant, ISO 8601 without zone; defaults to now
    pub at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OffsetsQuery {
    pub direction: Option<String>,
}

/// One stop's cumulative travel time and distance from the first stop.
#[derive(Debug, Serialize, ToSchema)]
pub struct StopOffsetRow {
    pub stop_id: i64,
    pub order: i64,
    pub name: String,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Absent for stops without coordinates
    pub offset_seconds: Option<f64>,
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopOffsetsResponse {
    pub route_id: i64,
    pub route_code: String,
    pub direction: Direction,
    pub source: OffsetSource,
    pub items: Vec<StopOffsetRow>,
}

/// The rider reference instant: an explicit parseable `at` wins, anything
/// else means the current local time.
fn resolve_at(raw: Option<&str>, timezone: chrono_tz::Tz) -> NaiveDateTime {
    raw.and_then(parse_local_iso)
        .unwrap_or_else(|| local_now(timezone))
}

fn parse_local_iso(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Project the next arrival at every stop of a direction
#[utoipa::path(
    get,
    path = "/api/routes/{id}/etas",
    params(
        ("id" = i64, Path, description = "Route ID"),
        ("direction" = Option<String>, Query, description = "outbound (default) or inbound"),
        ("at" = Option<String>, Query, description = "Reference instant, local ISO 8601; defaults to now")
    ),
    responses(
        (status = 200, description = "Next arrival per stop from the schedule model", body = RouteEtas),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 422, description = "Route data cannot support a schedule", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_etas(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(query): Query<EtasQuery>,
) -> Result<Json<RouteEtas>, (StatusCode, Json<ErrorResponse>)> {
    let route = state
        .store
        .route(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route"))?;

    let direction = Direction::parse(query.direction.as_deref().unwrap_or_default());
    let at = resolve_at(query.at.as_deref(), state.timezone);

    let etas = eta::predict_route_etas(&state.store, &state.resolver, &route, direction, at)
        .await
        .map_err(engine_error)?;

    Ok(Json(etas))
}

/// Show the offset table behind a direction's predictions
#[utoipa::path(
    get,
    path = "/api/routes/{id}/offsets",
    params(
        ("id" = i64, Path, description = "Route ID"),
        ("direction" = Option<String>, Query, description = "outbound (default) or inbound")
    ),
    responses(
        (status = 200, description = "Cumulative offsets per stop", body = StopOffsetsResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 422, description = "Route data cannot support a schedule", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_offsets(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(query): Query<OffsetsQuery>,
) -> Result<Json<StopOffsetsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let route = state
        .store
        .route(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route"))?;

    let direction = Direction::parse(query.direction.as_deref().unwrap_or_default());
    let stops = state
        .store
        .stops_for_direction(route.id, direction)
        .await
        .map_err(internal_error)?;

    let table = state
        .resolver
        .resolve(route.id, direction, &stops)
        .await
        .map_err(engine_error)?;

    let items = stops
        .iter()
        .map(|stop| StopOffsetRow {
            stop_id: stop.id,
            order: stop.stop_order,
            name: stop.name.clone(),
            address: stop.address.clone(),
            lat: stop.lat,
            lng: stop.lng,
            offset_seconds: table.offset_seconds(stop.id),
            distance_meters: table.distance_meters(stop.id),
        })
        .collect();

    Ok(Json(StopOffsetsResponse {
        route_id: route.id,
        route_code: route.code.clone(),
        direction,
        source: table.source,
        items,
    }))
}
