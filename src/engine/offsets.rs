//! Stop-offset tables: cumulative travel time and distance from the first
//! stop of a direction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::Config;
use crate::engine::cache::{OffsetCache, OffsetCacheKey};
use crate::engine::EngineError;
use crate::models::{Direction, Stop};
use crate::providers::osrm::{OsrmClient, OsrmError, RouteLeg};

/// Mean Earth radius in meters for the great-circle estimate.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Assumed speeds below this floor produce nonsense travel times.
const MIN_SPEED_MPS: f64 = 3.0;

/// Which strategy produced an offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum OffsetSource {
    #[serde(rename = "local-estimate")]
    LocalEstimate,
    #[serde(rename = "external-geometry")]
    ExternalGeometry,
}

/// Cumulative seconds and meters from the first stop, keyed by stop id.
/// Stops without coordinates never appear as keys.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OffsetTable {
    pub offsets: HashMap<i64, f64>,
    pub distances: HashMap<i64, f64>,
    pub source: OffsetSource,
}

impl OffsetTable {
    pub fn offset_seconds(&self, stop_id: i64) -> Option<f64> {
        self.offsets.get(&stop_id).copied()
    }

    pub fn distance_meters(&self, stop_id: i64) -> Option<f64> {
        self.distances.get(&stop_id).copied()
    }
}

/// A stop known to carry coordinates, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoStop {
    pub id: i64,
    pub order: i64,
    pub lat: f64,
    pub lng: f64,
}

/// The coordinate-bearing subset of a direction's stops, order preserved.
pub fn geo_stops(stops: &[Stop]) -> Vec<GeoStop> {
    stops
        .iter()
        .filter_map(|s| match (s.lat, s.lng) {
            (Some(lat), Some(lng)) => Some(GeoStop {
                id: s.id,
                order: s.stop_order,
                lat,
                lng,
            }),
            _ => None,
        })
        .collect()
}

/// Great-circle distance between two coordinates in meters.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// The always-available offset strategy: straight-line distance between
/// consecutive stops at an assumed speed, plus a fixed dwell per stop.
#[derive(Debug, Clone, Copy)]
pub struct LocalEstimate {
    /// Assumed average speed in km/h
    pub speed_kmh: f64,
    /// Fixed dwell added per travelled segment, seconds
    pub dwell_seconds: f64,
}

impl LocalEstimate {
    /// Build the offset table for an ordered coordinate-bearing stop
    /// sequence. The first stop sits at offset zero.
    pub fn compute(&self, geo: &[GeoStop]) -> OffsetTable {
        let speed_mps = (self.speed_kmh * 1000.0 / 3600.0).max(MIN_SPEED_MPS);

        let mut offsets = HashMap::new();
        let mut distances = HashMap::new();
        if let Some(first) = geo.first() {
            offsets.insert(first.id, 0.0);
            distances.insert(first.id, 0.0);
        }

        let mut elapsed_s = 0.0;
        let mut travelled_m = 0.0;
        for pair in geo.windows(2) {
            let segment_m = haversine_meters(pair[0].lat, pair[0].lng, pair[1].lat, pair[1].lng);
            elapsed_s += segment_m / speed_mps + self.dwell_seconds;
            travelled_m += segment_m;
            offsets.insert(pair[1].id, elapsed_s);
            distances.insert(pair[1].id, travelled_m);
        }

        OffsetTable {
            offsets,
            distances,
            source: OffsetSource::LocalEstimate,
        }
    }
}

/// Accumulate external routing legs into an offset table. Leg durations get
/// the bus factor applied; the dwell matches the local estimate so the two
/// strategies stay comparable.
fn table_from_legs(
    geo: &[GeoStop],
    legs: &[RouteLeg],
    duration_factor: f64,
    dwell_seconds: f64,
) -> OffsetTable {
    let mut offsets = HashMap::new();
    let mut distances = HashMap::new();
    if let Some(first) = geo.first() {
        offsets.insert(first.id, 0.0);
        distances.insert(first.id, 0.0);
    }

    let mut elapsed_s = 0.0;
    let mut travelled_m = 0.0;
    for (stop, leg) in geo.iter().skip(1).zip(legs) {
        elapsed_s += leg.duration_seconds * duration_factor + dwell_seconds;
        travelled_m += leg.distance_meters;
        offsets.insert(stop.id, elapsed_s);
        distances.insert(stop.id, travelled_m);
    }

    OffsetTable {
        offsets,
        distances,
        source: OffsetSource::ExternalGeometry,
    }
}

/// Resolves offset tables, preferring the external routing service when it
/// is configured and answering, and falling back to the local estimate
/// otherwise. Results are cached against a snapshot of the coordinates.
pub struct OffsetResolver {
    local: LocalEstimate,
    external: Option<OsrmClient>,
    duration_factor: f64,
    max_external_coordinates: usize,
    cache: OffsetCache,
}

impl OffsetResolver {
    pub fn new(config: &Config) -> Result<Self, OsrmError> {
        let external = if config.external_geometry.enabled {
            Some(OsrmClient::new(&config.external_geometry)?)
        } else {
            None
        };

        Ok(Self {
            local: LocalEstimate {
                speed_kmh: config.engine.average_speed_kmh,
                dwell_seconds: config.engine.stop_dwell_seconds,
            },
            external,
            duration_factor: config.external_geometry.duration_factor,
            max_external_coordinates: config.external_geometry.max_coordinates,
            cache: OffsetCache::new(Duration::from_secs(config.engine.offset_cache_ttl_seconds)),
        })
    }

    /// Resolve the offset table for one direction of a route.
    ///
    /// `stops` must already be in sequence order. Fails only when fewer than
    /// two of them carry coordinates; an unreachable external service is
    /// recovered by the local estimate, and the result is cached either way.
    pub async fn resolve(
        &self,
        route_id: i64,
        direction: Direction,
        stops: &[Stop],
    ) -> Result<OffsetTable, EngineError> {
        let geo = geo_stops(stops);
        if geo.len() < 2 {
            return Err(EngineError::InsufficientGeometry);
        }

        let key = OffsetCacheKey::new(route_id, direction, &geo);
        let now = Instant::now();
        if let Some(hit) = self.cache.get(&key, now) {
            return Ok(hit);
        }

        let table = self.compute(&geo).await;
        self.cache.insert(key, table.clone(), now);
        Ok(table)
    }

    async fn compute(&self, geo: &[GeoStop]) -> OffsetTable {
        if let Some(client) = &self.external {
            if geo.len() > self.max_external_coordinates {
                debug!(
                    stops = geo.len(),
                    limit = self.max_external_coordinates,
                    "Too many coordinates for the external service, using local estimate"
                );
            } else {
                let points: Vec<(f64, f64)> = geo.iter().map(|s| (s.lat, s.lng)).collect();
                match client.route_legs(&points).await {
                    Ok(legs) => {
                        return table_from_legs(
                            geo,
                            &legs,
                            self.duration_factor,
                            self.local.dwell_seconds,
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "External geometry lookup failed, using local estimate");
                    }
                }
            }
        }

        self.local.compute(geo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    // One degree of longitude on the equator.
    const DEG_LNG_M: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

    #[test]
    fn haversine_matches_equator_arc() {
        let d = haversine_meters(0.0, 0.0, 0.0, 1.0);
        assert!((d - DEG_LNG_M).abs() < 1.0, "got {d}, want ~{DEG_LNG_M}");
    }

    #[test]
    fn haversine_is_zero_for_identical_points() {
        assert_eq!(haversine_meters(48.37, 10.89, 48.37, 10.89), 0.0);
    }

    #[test]
    fn geo_stops_drops_coordinate_less_entries() {
        let stops = vec![
            stop(1, 1, Some(0.0), Some(0.0)),
            stop(2, 2, None, Some(10.0)),
            stop(3, 3, Some(0.0), Some(0.1)),
        ];
        let geo = geo_stops(&stops);
        assert_eq!(geo.len(), 2);
        assert_eq!(geo[0].id, 1);
        assert_eq!(geo[1].id, 3);
    }

    #[test]
    fn local_estimate_accumulates_travel_and_dwell() {
        // Two segments of ~2000 m each along the equator.
        let step = 2000.0 / DEG_LNG_M;
        let geo = vec![
            GeoStop { id: 1, order: 1, lat: 0.0, lng: 0.0 },
            GeoStop { id: 2, order: 2, lat: 0.0, lng: step },
            GeoStop { id: 3, order: 3, lat: 0.0, lng: 2.0 * step },
        ];
        let estimate = LocalEstimate { speed_kmh: 22.0, dwell_seconds: 15.0 };
        let table = estimate.compute(&geo);

        assert_eq!(table.source, OffsetSource::LocalEstimate);
        assert_eq!(table.offset_seconds(1), Some(0.0));
        assert_eq!(table.distance_meters(1), Some(0.0));

        // 2000 m at 22 km/h is ~327.3 s, plus the 15 s dwell.
        let first = table.offset_seconds(2).unwrap();
        assert!((first - 342.3).abs() < 0.5, "got {first}");
        let second = table.offset_seconds(3).unwrap();
        assert!((second - 684.5).abs() < 1.0, "got {second}");
        let travelled = table.distance_meters(3).unwrap();
        assert!((travelled - 4000.0).abs() < 2.0, "got {travelled}");
    }

    #[test]
    fn local_estimate_enforces_speed_floor() {
        let step = 300.0 / DEG_LNG_M;
        let geo = vec![
            GeoStop { id: 1, order: 1, lat: 0.0, lng: 0.0 },
            GeoStop { id: 2, order: 2, lat: 0.0, lng: step },
        ];
        // 1 km/h would be 0.28 m/s; the floor holds it at 3 m/s.
        let estimate = LocalEstimate { speed_kmh: 1.0, dwell_seconds: 15.0 };
        let table = estimate.compute(&geo);
        let offset = table.offset_seconds(2).unwrap();
        assert!((offset - 115.0).abs() < 0.5, "got {offset}");
    }

    #[test]
    fn single_geo_stop_table_has_only_the_anchor() {
        let geo = vec![GeoStop { id: 7, order: 1, lat: 0.0, lng: 0.0 }];
        let estimate = LocalEstimate { speed_kmh: 22.0, dwell_seconds: 15.0 };
        let table = estimate.compute(&geo);
        assert_eq!(table.offsets.len(), 1);
        assert_eq!(table.offset_seconds(7), Some(0.0));
    }

    #[test]
    fn external_legs_accumulate_with_bus_factor() {
        let geo = vec![
            GeoStop { id: 1, order: 1, lat: 0.0, lng: 0.0 },
            GeoStop { id: 2, order: 2, lat: 0.0, lng: 0.01 },
            GeoStop { id: 3, order: 3, lat: 0.0, lng: 0.02 },
        ];
        let legs = vec![
            RouteLeg { duration_seconds: 100.0, distance_meters: 1000.0 },
            RouteLeg { duration_seconds: 200.0, distance_meters: 2000.0 },
        ];
        let table = table_from_legs(&geo, &legs, 1.25, 15.0);

        assert_eq!(table.source, OffsetSource::ExternalGeometry);
        assert_eq!(table.offset_seconds(1), Some(0.0));
        assert_eq!(table.offset_seconds(2), Some(140.0));
        assert_eq!(table.offset_seconds(3), Some(405.0));
        assert_eq!(table.distance_meters(3), Some(3000.0));
    }
}
