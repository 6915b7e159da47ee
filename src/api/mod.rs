pub mod error;
pub mod health;
pub mod routes;
pub mod stops;
pub mod trips;

pub use error::{engine_error, internal_error, not_found, ErrorResponse};

use std::sync::Arc;

use axum::Router;

use crate::engine::OffsetResolver;
use crate::store::TimetableStore;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: TimetableStore,
    pub resolver: Arc<OffsetResolver>,
    pub timezone: chrono_tz::Tz,
    /// Forward horizon for request-triggered generation, minutes
    pub horizon_minutes: u32,
    /// Fallback fare amount when a route's fare text has no digits
    pub default_fare_amount: f64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .nest("/routes", routes::router(state.clone()))
        .nest("/stops", stops::router(state.clone()))
        .nest("/trips", trips::router(state.clone()))
        .nest("/health", health::router(state))
}
