//! Arrival prediction: projection from the schedule model, and the arrival
//! board backed by persisted trips.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::headway;
use crate::engine::offsets::{OffsetResolver, OffsetSource};
use crate::engine::trips;
use crate::engine::window::{self, OperatingWindow};
use crate::engine::EngineError;
use crate::models::{Direction, Route, Stop, Trip};
use crate::store::TimetableStore;

/// Bounds on the arrival-board length.
const MIN_BOARD_LIMIT: usize = 5;
const MAX_BOARD_LIMIT: usize = 60;
pub const DEFAULT_BOARD_LIMIT: usize = 20;

/// Bounds on the backfill applied before the board's generation call.
const MIN_BACKFILL_MINUTES: u32 = 30;
const MAX_BACKFILL_MINUTES: u32 = 180;

const ISO_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

/// Projected next arrival at one stop of a direction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StopEta {
    pub stop_id: i64,
    pub order: i64,
    pub name: String,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Cumulative seconds from the first stop, absent without coordinates
    pub offset_seconds: Option<f64>,
    pub distance_meters: Option<f64>,
    /// Local ISO arrival, absent when the stop has no further service today
    pub eta_iso: Option<String>,
    pub eta_time: Option<String>,
    pub eta_in_minutes: Option<i64>,
}

/// Route-level ETA projection built from the schedule model alone.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteEtas {
    pub route_id: i64,
    pub route_code: String,
    pub direction: Direction,
    pub as_of: String,
    pub operating_hours: Option<String>,
    pub headway_minutes: u32,
    pub offset_source: OffsetSource,
    pub items: Vec<StopEta>,
}

/// The next headway-aligned departure second serving a stop, given a rider
/// standing there at `at_second` of the day.
///
/// The vehicle passing the stop at time t left the first stop at t minus the
/// stop's offset, so the relevant departure is the first grid point at or
/// after max(window start, at - offset). A departure past the window end
/// means no further service today.
pub fn next_departure_second(
    window: &OperatingWindow,
    headway_seconds: u32,
    at_second: i64,
    offset_seconds: f64,
) -> Option<i64> {
    let start = i64::from(window.start_second());
    let end = i64::from(window.end_second());

    let target = start.max(at_second - offset_seconds.round() as i64);
    let k = ceil_div(target - start, i64::from(headway_seconds));
    let departure = start + k * i64::from(headway_seconds);
    if departure <= end {
        Some(departure)
    } else {
        None
    }
}

fn ceil_div(numerator: i64, divisor: i64) -> i64 {
    if divisor <= 0 {
        return 0;
    }
    let numerator = numerator.max(0);
    (numerator + divisor - 1) / divisor
}

/// Project the next arrival at every stop of a direction from the window,
/// headway and offset table, without touching persisted trips.
pub async fn predict_route_etas(
    store: &TimetableStore,
    resolver: &OffsetResolver,
    route: &Route,
    direction: Direction,
    at: NaiveDateTime,
) -> Result<RouteEtas, EngineError> {
    let window = route
        .operating_hours
        .as_deref()
        .and_then(window::parse_operating_window)
        .ok_or(EngineError::NoScheduleWindow)?;

    let directions = store.directions_with_stops(route.id).await?;
    let headway_minutes = headway::resolve_headway(
        route.frequency_minutes,
        route.trips_per_day,
        window.length_minutes(),
        directions.len(),
    )
    .ok_or(EngineError::NoFrequencyData)?;

    let stops = store.stops_for_direction(route.id, direction).await?;
    let table = resolver.resolve(route.id, direction, &stops).await?;

    let base = NaiveDateTime::new(at.date(), NaiveTime::MIN);
    let at_second = i64::from(at.num_seconds_from_midnight());
    let headway_seconds = headway_minutes * 60;

    let mut items = Vec::with_capacity(stops.len());
    for stop in &stops {
        let offset = table.offset_seconds(stop.id);
        let distance = table.distance_meters(stop.id);

        let arrival = offset.and_then(|offset_s| {
            next_departure_second(&window, headway_seconds, at_second, offset_s)
                .map(|depart_s| base + Duration::seconds(depart_s + offset_s.round() as i64))
        });

        items.push(StopEta {
            stop_id: stop.id,
            order: stop.stop_order,
            name: stop.name.clone(),
            address: stop.address.clone(),
            lat: stop.lat,
            lng: stop.lng,
            offset_seconds: offset,
            distance_meters: distance,
            eta_iso: arrival.map(|a| a.format(ISO_SECONDS).to_string()),
            eta_time: arrival.map(|a| a.format("%H:%M").to_string()),
            eta_in_minutes: arrival.map(|a| minutes_between(at, a)),
        });
    }

    Ok(RouteEtas {
        route_id: route.id,
        route_code: route.code.clone(),
        direction,
        as_of: at.format(ISO_SECONDS).to_string(),
        operating_hours: route.operating_hours.clone(),
        headway_minutes,
        offset_source: table.source,
        items,
    })
}

/// Signed whole minutes from `from` to `to`, rounded to nearest.
fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    (((to - from).num_seconds()) as f64 / 60.0).round() as i64
}

/// One row of a stop's arrival board.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StopArrival {
    pub trip_id: i64,
    pub date: String,
    pub departure_time: String,
    pub direction: Direction,
    pub eta_iso: String,
    pub eta_time: String,
    pub eta_in_minutes: i64,
}

/// Arrival board for one stop, fed by persisted trips.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArrivalBoard {
    pub stop_id: i64,
    pub route_id: i64,
    pub route_code: String,
    pub direction: Direction,
    pub as_of: String,
    /// Strategy behind the applied offsets, absent when none resolved
    pub offset_source: Option<OffsetSource>,
    /// Without an offset the raw departure time stands in for the arrival,
    /// which is only meaningful near the first stop
    pub offset_applied: bool,
    pub arrivals: Vec<StopArrival>,
}

/// Minutes of backfill before "now" for the board's generation call, so a
/// vehicle already underway toward this stop still gets its trip row.
pub fn backfill_minutes(offset_seconds: Option<f64>) -> u32 {
    match offset_seconds {
        Some(offset_s) => {
            let ride = (offset_s / 60.0).ceil() as u32 + 5;
            ride.clamp(MIN_BACKFILL_MINUTES, MAX_BACKFILL_MINUTES)
        }
        None => MIN_BACKFILL_MINUTES,
    }
}

/// Build board rows from persisted trips.
///
/// Each row's reference instant is the predicted arrival when an offset is
/// known, else the raw departure. Rows more than a minute in the past are
/// dropped; the rest sort by (arrival, trip id) and truncate to `limit`.
/// Trips with unparseable fields are skipped entirely.
pub fn build_arrival_board_rows(
    trips: &[Trip],
    offset_seconds: Option<f64>,
    now: NaiveDateTime,
    limit: usize,
) -> Vec<StopArrival> {
    let cutoff = now - Duration::minutes(1);

    let mut rows = Vec::new();
    for trip in trips {
        let Some(departure) = trip.departure() else {
            continue;
        };
        let reference = match offset_seconds {
            Some(offset_s) => departure + Duration::seconds(offset_s.round() as i64),
            None => departure,
        };
        if reference < cutoff {
            continue;
        }

        rows.push(StopArrival {
            trip_id: trip.id,
            date: trip.service_date.clone(),
            departure_time: trip.departure_time.clone(),
            direction: trip.direction,
            eta_iso: reference.format(ISO_SECONDS).to_string(),
            eta_time: reference.format("%H:%M").to_string(),
            eta_in_minutes: minutes_between(now, reference).max(0),
        });
    }

    rows.sort_by(|a, b| a.eta_iso.cmp(&b.eta_iso).then(a.trip_id.cmp(&b.trip_id)));
    rows.truncate(limit);
    rows
}

/// Predict upcoming arrivals at a stop, topping up near-term trips first.
///
/// The direction is the stop's own. Offsets are optional here: a direction
/// without enough geometry still gets a board keyed by raw departure times.
pub async fn stop_arrival_board(
    store: &TimetableStore,
    resolver: &OffsetResolver,
    route: &Route,
    stop: &Stop,
    now: NaiveDateTime,
    limit: Option<usize>,
    default_horizon_minutes: u32,
) -> Result<ArrivalBoard, EngineError> {
    let direction = stop.direction;
    let limit = limit
        .unwrap_or(DEFAULT_BOARD_LIMIT)
        .clamp(MIN_BOARD_LIMIT, MAX_BOARD_LIMIT);

    let stops = store.stops_for_direction(route.id, direction).await?;
    let (offset_seconds, offset_source) = match resolver.resolve(route.id, direction, &stops).await
    {
        Ok(table) => (table.offset_seconds(stop.id), Some(table.source)),
        Err(EngineError::InsufficientGeometry) => (None, None),
        Err(e) => return Err(e),
    };

    let backfill = backfill_minutes(offset_seconds);
    trips::ensure_upcoming_trips(
        store,
        route,
        now - Duration::minutes(i64::from(backfill)),
        backfill + default_horizon_minutes,
    )
    .await?;

    let date = now.date().format("%Y-%m-%d").to_string();
    let today = store.trips_for_direction(route.id, &date, direction).await?;
    let arrivals = build_arrival_board_rows(&today, offset_seconds, now, limit);

    Ok(ArrivalBoard {
        stop_id: stop.id,
        route_id: route.id,
        route_code: route.code.clone(),
        direction,
        as_of: now.format(ISO_SECONDS).to_string(),
        offset_source,
        offset_applied: offset_seconds.is_some(),
        arrivals,
    })
}

/// Per-stop projected times for one persisted trip.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripStopTime {
    pub stop_id: i64,
    pub order: i64,
    pub name: String,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub eta_iso: Option<String>,
    pub eta_time: Option<String>,
    pub offset_minutes: Option<i64>,
    pub distance_km: Option<f64>,
}

/// A persisted trip projected over its direction's stop sequence.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripSchedule {
    pub trip_id: i64,
    pub route_id: i64,
    pub route_code: String,
    pub date: String,
    pub departure_time: String,
    pub direction: Direction,
    pub is_past: bool,
    /// Absent when the direction lacks the geometry for an offset table
    pub offset_source: Option<OffsetSource>,
    pub stops: Vec<TripStopTime>,
}

/// Project one trip over its stop sequence. Tolerates missing geometry and
/// unparseable trip fields by leaving the projected times empty.
pub async fn trip_schedule(
    store: &TimetableStore,
    resolver: &OffsetResolver,
    route: &Route,
    trip: &Trip,
    now: NaiveDateTime,
) -> Result<TripSchedule, EngineError> {
    let stops = store.stops_for_direction(route.id, trip.direction).await?;
    let table = match resolver.resolve(route.id, trip.direction, &stops).await {
        Ok(table) => Some(table),
        Err(EngineError::InsufficientGeometry) => None,
        Err(e) => return Err(e),
    };

    let departure = trip.departure();
    let rows = stops
        .iter()
        .map(|stop| {
            let offset = table.as_ref().and_then(|t| t.offset_seconds(stop.id));
            let distance = table.as_ref().and_then(|t| t.distance_meters(stop.id));
            let arrival = match (departure, offset) {
                (Some(dep), Some(off)) => Some(dep + Duration::seconds(off.round() as i64)),
                _ => None,
            };
            TripStopTime {
                stop_id: stop.id,
                order: stop.stop_order,
                name: stop.name.clone(),
                address: stop.address.clone(),
                lat: stop.lat,
                lng: stop.lng,
                eta_iso: arrival.map(|a| a.format(ISO_SECONDS).to_string()),
                eta_time: arrival.map(|a| a.format("%H:%M").to_string()),
                offset_minutes: offset.map(|o| (o / 60.0).round() as i64),
                distance_km: distance.map(|d| (d / 10.0).round() / 100.0),
            }
        })
        .collect();

    Ok(TripSchedule {
        trip_id: trip.id,
        route_id: route.id,
        route_code: route.code.clone(),
        date: trip.service_date.clone(),
        departure_time: trip.departure_time.clone(),
        direction: trip.direction,
        is_past: matches!(departure, Some(dep) if dep < now),
        offset_source: table.map(|t| t.source),
        stops: rows,
    })
}
