use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::{internal_error, not_found, ApiState, ErrorResponse};
use crate::models::{parse_fare_amount, Direction, Route, Stop};
use crate::store::TimetableStore;

/// Threshold on geometry coverage below which a route is not ready for
/// schedule displays, percent.
const READY_COVERAGE_PERCENT: f64 = 80.0;

/// Per-direction stop counts and geometry coverage.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DirectionStats {
    pub direction: Direction,
    pub stops: i64,
    pub with_geo: i64,
    /// Share of stops carrying coordinates, one decimal
    pub percent_with_geo: f64,
    /// At least two coordinate-bearing stops: enough to shape the direction
    pub has_enough_shape: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DirectionBreakdown {
    pub outbound: DirectionStats,
    pub inbound: DirectionStats,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GeoTotals {
    pub stops: i64,
    pub with_geo: i64,
    pub percent_with_geo: f64,
}

/// Whether a route's stop data suffices for schedule displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Ready,
    Incomplete,
}

/// A route together with its schedule-data readiness.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteSummary {
    pub route: Route,
    pub directions: DirectionBreakdown,
    pub totals: GeoTotals,
    pub data_status: DataStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<RouteSummary>,
    pub total: usize,
}

/// First and last geo-located stops of a direction, for map overviews.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteEndpoints {
    pub direction: Direction,
    pub start: EndpointStop,
    pub end: EndpointStop,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointStop {
    pub stop_id: i64,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub order: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteDetailResponse {
    #[serde(flatten)]
    pub summary: RouteSummary,
    /// Numeric fare parsed out of the free-text fare field
    pub fare_amount: f64,
    /// Absent when neither direction has two geo-located stops
    pub endpoints: Option<RouteEndpoints>,
}

#[derive(Debug, Deserialize)]
pub struct DirectionQuery {
    pub direction: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopListResponse {
    pub route_id: i64,
    pub direction: Direction,
    pub stops: Vec<Stop>,
    pub total: usize,
}

fn percent_with_geo(total: i64, with_geo: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (with_geo as f64 * 100.0 / total as f64 * 10.0).round() / 10.0
}

fn direction_stats(direction: Direction, stops: i64, with_geo: i64) -> DirectionStats {
    DirectionStats {
        direction,
        stops,
        with_geo,
        percent_with_geo: percent_with_geo(stops, with_geo),
        has_enough_shape: stops >= 2 && with_geo >= 2,
    }
}

/// Fold per-direction stats into the route's overall readiness. A route is
/// ready when it has stops at all, every direction that has stops also has
/// enough shape, and overall coverage reaches the threshold.
fn summarize(route: Route, outbound: DirectionStats, inbound: DirectionStats) -> RouteSummary {
    let stops = outbound.stops + inbound.stops;
    let with_geo = outbound.with_geo + inbound.with_geo;
    let percent = percent_with_geo(stops, with_geo);

    let geometry_ok = [&outbound, &inbound]
        .iter()
        .all(|stats| stats.has_enough_shape || stats.stops == 0);
    let data_status = if stops > 0 && geometry_ok && percent >= READY_COVERAGE_PERCENT {
        DataStatus::Ready
    } else {
        DataStatus::Incomplete
    };

    RouteSummary {
        route,
        directions: DirectionBreakdown { outbound, inbound },
        totals: GeoTotals {
            stops,
            with_geo,
            percent_with_geo: percent,
        },
        data_status,
    }
}

async fn load_summary(store: &TimetableStore, route: Route) -> Result<RouteSummary, sqlx::Error> {
    let (out_total, out_geo) = store
        .direction_stop_stats(route.id, Direction::Outbound)
        .await?;
    let (in_total, in_geo) = store
        .direction_stop_stats(route.id, Direction::Inbound)
        .await?;
    Ok(summarize(
        route,
        direction_stats(Direction::Outbound, out_total, out_geo),
        direction_stats(Direction::Inbound, in_total, in_geo),
    ))
}

/// First and last coordinate-bearing stops of an already-ordered sequence.
fn pick_endpoints(direction: Direction, stops: &[Stop]) -> Option<RouteEndpoints> {
    let geo: Vec<&Stop> = stops.iter().filter(|s| s.has_coordinates()).collect();
    let (first, last) = match (geo.first(), geo.last()) {
        (Some(first), Some(last)) if geo.len() >= 2 => (*first, *last),
        _ => return None,
    };

    Some(RouteEndpoints {
        direction,
        start: endpoint_stop(first)?,
        end: endpoint_stop(last)?,
    })
}

fn endpoint_stop(stop: &Stop) -> Option<EndpointStop> {
    Some(EndpointStop {
        stop_id: stop.id,
        name: stop.name.clone(),
        lat: stop.lat?,
        lng: stop.lng?,
        order: stop.stop_order,
    })
}

/// List all routes with their schedule-data readiness
#[utoipa::path(
    get,
    path = "/api/routes",
    responses(
        (status = 200, description = "All routes with geometry coverage and readiness", body = RouteListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn list_routes(
    State(state): State<ApiState>,
) -> Result<Json<RouteListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let routes = state.store.routes().await.map_err(internal_error)?;

    let mut summaries = Vec::with_capacity(routes.len());
    for route in routes {
        let summary = load_summary(&state.store, route)
            .await
            .map_err(internal_error)?;
        summaries.push(summary);
    }

    let total = summaries.len();
    Ok(Json(RouteListResponse {
        routes: summaries,
        total,
    }))
}

/// Get one route with readiness, endpoints and parsed fare
#[utoipa::path(
    get,
    path = "/api/routes/{id}",
    params(
        ("id" = i64, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Route detail", body = RouteDetailResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<RouteDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let route = state
        .store
        .route(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route"))?;

    let fare_amount = parse_fare_amount(route.fare.as_deref(), state.default_fare_amount);

    // Prefer the outbound shape for the map overview, fall back to inbound.
    let outbound_stops = state
        .store
        .stops_for_direction(id, Direction::Outbound)
        .await
        .map_err(internal_error)?;
    let endpoints = match pick_endpoints(Direction::Outbound, &outbound_stops) {
        Some(endpoints) => Some(endpoints),
        None => {
            let inbound_stops = state
                .store
                .stops_for_direction(id, Direction::Inbound)
                .await
                .map_err(internal_error)?;
            pick_endpoints(Direction::Inbound, &inbound_stops)
        }
    };

    let summary = load_summary(&state.store, route)
        .await
        .map_err(internal_error)?;

    Ok(Json(RouteDetailResponse {
        summary,
        fare_amount,
        endpoints,
    }))
}

/// List the stops of one direction in boarding sequence
#[utoipa::path(
    get,
    path = "/api/routes/{id}/stops",
    params(
        ("id" = i64, Path, description = "Route ID"),
        ("direction" = Option<String>, Query, description = "outbound (default) or inbound")
    ),
    responses(
        (status = 200, description = "Stops in sequence order", body = StopListResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_stops(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(query): Query<DirectionQuery>,
) -> Result<Json<StopListResponse>, (StatusCode, Json<ErrorResponse>)> {
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

    let total = stops.len();
    Ok(Json(StopListResponse {
        route_id: route.id,
        direction,
        stops,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Route {
        Route {
            id: 1,
            code: "12B".to_string(),
            name: "Harbor loop".to_string(),
            start_point: Some("Harbor".to_string()),
            end_point: Some("Central".to_string()),
            operating_hours: Some("05:30 - 19:00".to_string()),
            frequency_minutes: Some(20),
            trips_per_day: None,
            distance_km: Some(14.2),
            fare: Some("7.000 per ride".to_string()),
            notes: None,
        }
    }

    fn stop(id: i64, order: i64, lat: Option<f64>, lng: Option<f64>) -> Stop {
        Stop {
            id,
            route_id: 1,
            name: format!("stop {id}"),
            address: None,
            lat,
            lng,
            stop_order: order,
            direction: Direction::Outbound,
        }
    }

    #[test]
    fn percent_rounds_to_one_decimal() {
        assert_eq!(percent_with_geo(3, 1), 33.3);
        assert_eq!(percent_with_geo(3, 2), 66.7);
        assert_eq!(percent_with_geo(0, 0), 0.0);
        assert_eq!(percent_with_geo(10, 10), 100.0);
    }

    #[test]
    fn shape_needs_two_geo_stops() {
        assert!(direction_stats(Direction::Outbound, 5, 2).has_enough_shape);
        assert!(!direction_stats(Direction::Outbound, 5, 1).has_enough_shape);
        assert!(!direction_stats(Direction::Outbound, 1, 1).has_enough_shape);
    }

    #[test]
    fn full_coverage_is_ready() {
        let summary = summarize(
            route(),
            direction_stats(Direction::Outbound, 10, 10),
            direction_stats(Direction::Inbound, 10, 9),
        );
        assert_eq!(summary.data_status, DataStatus::Ready);
        assert_eq!(summary.totals.percent_with_geo, 95.0);
    }

    #[test]
    fn one_direction_without_stops_can_still_be_ready() {
        let summary = summarize(
            route(),
            direction_stats(Direction::Outbound, 10, 9),
            direction_stats(Direction::Inbound, 0, 0),
        );
        assert_eq!(summary.data_status, DataStatus::Ready);
    }

    #[test]
    fn poor_coverage_is_incomplete() {
        let summary = summarize(
            route(),
            direction_stats(Direction::Outbound, 10, 7),
            direction_stats(Direction::Inbound, 10, 7),
        );
        assert_eq!(summary.data_status, DataStatus::Incomplete);
        assert_eq!(summary.totals.percent_with_geo, 70.0);
    }

    #[test]
    fn thin_direction_blocks_readiness_despite_coverage() {
        // Inbound has a single surveyed stop with coordinates: 100% covered
        // but not enough to shape the direction.
        let summary = summarize(
            route(),
            direction_stats(Direction::Outbound, 10, 10),
            direction_stats(Direction::Inbound, 1, 1),
        );
        assert_eq!(summary.data_status, DataStatus::Incomplete);
    }

    #[test]
    fn no_stops_at_all_is_incomplete() {
        let summary = summarize(
            route(),
            direction_stats(Direction::Outbound, 0, 0),
            direction_stats(Direction::Inbound, 0, 0),
        );
        assert_eq!(summary.data_status, DataStatus::Incomplete);
    }

    #[test]
    fn endpoints_take_first_and_last_geo_stops() {
        let stops = vec![
            stop(1, 1, None, None),
            stop(2, 2, Some(48.37), Some(10.89)),
            stop(3, 3, Some(48.38), Some(10.90)),
            stop(4, 4, Some(48.39), Some(10.91)),
            stop(5, 5, None, None),
        ];
        let endpoints = pick_endpoints(Direction::Outbound, &stops).unwrap();
        assert_eq!(endpoints.start.stop_id, 2);
        assert_eq!(endpoints.end.stop_id, 4);
    }

    #[test]
    fn endpoints_need_two_geo_stops() {
        let stops = vec![stop(1, 1, Some(48.37), Some(10.89)), stop(2, 2, None, None)];
        assert!(pick_endpoints(Direction::Outbound, &stops).is_none());
        assert!(pick_endpoints(Direction::Outbound, &[]).is_none());
    }
}
