mod list;

pub use list::*;

use axum::{routing::get, Router};

use super::ApiState;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/{id}", get(get_trip))
        .with_state(state)
}
