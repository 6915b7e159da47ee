mod etas;
mod list;
mod trips;

pub use etas::*;
pub use list::*;
pub use trips::*;

use axum::{
    routing::{get, post},
    Router,
};

use super::ApiState;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(list_routes))
        .route("/{id}", get(get_route))
        .route("/{id}/stops", get(get_route_stops))
        .route("/{id}/offsets", get(get_route_offsets))
        .route("/{id}/etas", get(get_route_etas))
        .route("/{id}/trips", get(get_route_trips))
        .route("/{id}/trips/generate", post(generate_route_trips))
        .with_state(state)
}
