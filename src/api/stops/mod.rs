mod list;

pub use list::*;

use axum::{routing::get, Router};

use super::ApiState;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/{id}", get(get_stop))
        .route("/{id}/arrivals", get(get_stop_arrivals))
        .with_state(state)
}
