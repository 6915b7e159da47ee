//! Domain records for routes, stops and scheduled trips.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Travel direction along a route. Every stop sequence and every generated
/// trip belongs to exactly one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Outbound, Direction::Inbound];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }

    /// Lenient parse for query parameters and stored rows. Anything that is
    /// not recognisably inbound counts as outbound.
    pub fn parse(value: &str) -> Direction {
        if value.trim().eq_ignore_ascii_case("inbound") {
            Direction::Inbound
        } else {
            Direction::Outbound
        }
    }
}

/// A bus route as maintained by the operator's admin workflow. The schedule
/// engine only ever reads these.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Route {
    pub id: i64,
    /// Short public route code, e.g. "12B". Unique across the network.
    pub code: String,
    pub name: String,
    pub start_point: Option<String>,
    pub end_point: Option<String>,
    /// Free-text operating hours, e.g. "05:30 - 19:00"
    pub operating_hours: Option<String>,
    /// Explicit minutes between departures, when the operator publishes one
    pub frequency_minutes: Option<i64>,
    /// Total daily trips counted across both directions
    pub trips_per_day: Option<i64>,
    pub distance_km: Option<f64>,
    /// Free-text fare descriptor
    pub fare: Option<String>,
    pub notes: Option<String>,
}

/// A stop on one direction of a route. Coordinates are optional because stop
/// data arrives incrementally from surveys.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Stop {
    pub id: i64,
    pub route_id: i64,
    pub name: String,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Position within the direction's sequence; not necessarily contiguous
    pub stop_order: i64,
    pub direction: Direction,
}

impl Stop {
    pub fn has_coordinates(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

/// A concrete departure on a service date, produced by the generator.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Trip {
    pub id: i64,
    pub route_id: i64,
    /// Calendar date, YYYY-MM-DD
    pub service_date: String,
    /// Local time of day, HH:MM
    pub departure_time: String,
    pub direction: Direction,
}

impl Trip {
    /// Departure as a naive local timestamp, when both fields parse. Rows
    /// entered by hand may carry values the generator never writes.
    pub fn departure(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(&self.service_date, "%Y-%m-%d").ok()?;
        let time = NaiveTime::parse_from_str(&self.departure_time, "%H:%M").ok()?;
        Some(NaiveDateTime::new(date, time))
    }
}

/// A trip candidate produced by the generator, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrip {
    pub route_id: i64,
    pub service_date: String,
    pub departure_time: String,
    pub direction: Direction,
}

/// Extract a numeric fare amount from a route's free-text fare field by
/// concatenating its digits. Falls back when the text is absent or carries
/// no digits at all.
pub fn parse_fare_amount(fare: Option<&str>, fallback: f64) -> f64 {
    let digits: String = fare
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return fallback;
    }
    digits.parse().unwrap_or(fallback)
}

/// Current wall-clock time in the network's timezone as a naive local
/// timestamp. All schedule arithmetic is local minute-of-day.
pub fn local_now(tz: chrono_tz::Tz) -> NaiveDateTime {
    chrono::Utc::now().with_timezone(&tz).naive_local()
}
