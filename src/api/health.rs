use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::ApiState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether the service is running
    pub healthy: bool,
    /// Whether the database answered the probe
    pub database_ok: bool,
    /// Number of routes in the database
    pub route_count: i64,
    /// Number of stops in the database
    pub stop_count: i64,
    /// Number of generated trips in the database
    pub trip_count: i64,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let database_ok = state.store.ping().await.is_ok();
    let (route_count, stop_count, trip_count) = if database_ok {
        state.store.table_counts().await.unwrap_or((0, 0, 0))
    } else {
        (0, 0, 0)
    };

    Json(HealthResponse {
        healthy: true,
        database_ok,
        route_count,
        stop_count,
        trip_count,
    })
}

pub fn router(state: ApiState) -> Router {
    Router::new().route("/", get(health_check)).with_state(state)
}
