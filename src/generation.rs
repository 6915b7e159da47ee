//! Background generation of upcoming trips.
//!
//! A periodic sweep walks every route and tops up its trip table over the
//! configured horizon, so arrival boards and listings are warm without
//! waiting for a request to trigger generation. Routes that cannot be
//! scheduled yet (no window, no frequency data) are expected and skipped.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::engine::{trips, EngineError};
use crate::models::local_now;
use crate::store::TimetableStore;

pub struct GenerationManager {
    store: TimetableStore,
    timezone: chrono_tz::Tz,
    horizon_minutes: u32,
    interval_secs: u64,
    max_concurrent_routes: usize,
}

impl GenerationManager {
    pub fn new(store: TimetableStore, config: &Config) -> Self {
        Self {
            store,
            timezone: config.parsed_timezone(),
            horizon_minutes: config.engine.default_horizon_minutes,
            interval_secs: config.generation.interval_secs,
            max_concurrent_routes: config.generation.max_concurrent_routes.max(1),
        }
    }

    /// Run the sweep loop forever. The first sweep fires immediately so a
    /// fresh deployment has trips before the first request.
    pub async fn start(self: Arc<Self>) {
        info!(
            interval_secs = self.interval_secs,
            horizon_minutes = self.horizon_minutes,
            "Starting trip generation sweeps"
        );
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(self.interval_secs));

        loop {
            interval.tick().await;
            self.sweep_all_routes().await;
        }
    }

    /// Generate upcoming trips for every route, a few routes at a time.
    async fn sweep_all_routes(&self) {
        let routes = match self.store.routes().await {
            Ok(routes) => routes,
            Err(e) => {
                error!(error = %e, "Failed to list routes for generation sweep");
                return;
            }
        };
        if routes.is_empty() {
            debug!("No routes to sweep");
            return;
        }

        let now = local_now(self.timezone);
        let total = routes.len();

        let results: Vec<(String, Result<u32, EngineError>)> = futures::stream::iter(routes)
            .map(|route| {
                let store = self.store.clone();
                let horizon = self.horizon_minutes;
                async move {
                    let outcome = trips::ensure_upcoming_trips(&store, &route, now, horizon).await;
                    (route.code, outcome)
                }
            })
            .buffer_unordered(self.max_concurrent_routes)
            .collect()
            .await;

        let mut inserted = 0u32;
        let mut unschedulable = 0usize;
        let mut failures = 0usize;
        for (code, outcome) in results {
            match outcome {
                Ok(count) => inserted += count,
                Err(EngineError::Database(e)) => {
                    failures += 1;
                    error!(route = %code, error = %e, "Trip generation failed");
                }
                Err(reason) => {
                    unschedulable += 1;
                    debug!(route = %code, reason = %reason, "Route not schedulable yet");
                }
            }
        }

        info!(
            routes = total,
            inserted, unschedulable, failures, "Completed generation sweep"
        );
    }
}
