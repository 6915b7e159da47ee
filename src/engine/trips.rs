//! Generation of upcoming trips on a headway grid, and the upcoming-trip
//! listing derived from them.

use std::collections::HashSet;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::engine::headway;
use crate::engine::window::{self, OperatingWindow};
use crate::engine::EngineError;
use crate::models::{Direction, NewTrip, Route, Trip};
use crate::store::{TimetableStore, TripInsertOutcome};

/// Bounds on the forward generation horizon.
const MIN_HORIZON_MINUTES: u32 = 30;
const MAX_HORIZON_MINUTES: u32 = 1440;

/// Departure minutes on the headway grid within the generation sub-window.
///
/// Grid points are window start plus whole multiples of the headway. The
/// sub-window runs from max(window start, now) to min(window end, from +
/// horizon); when it is empty there is nothing to generate.
pub fn departure_grid(
    window: &OperatingWindow,
    headway_minutes: u32,
    now_minute: u32,
    horizon_minutes: u32,
) -> Vec<u32> {
    let from = window.start_minute.max(now_minute);
    let to = window.end_minute.min(from + horizon_minutes);
    if to < from {
        return Vec::new();
    }

    let misalignment = (from - window.start_minute) % headway_minutes;
    let first = if misalignment == 0 {
        from
    } else {
        from + (headway_minutes - misalignment)
    };

    let mut minutes = Vec::new();
    let mut t = first;
    while t <= to {
        minutes.push(t);
        t += headway_minutes;
    }
    minutes
}

/// Format a minute of day as HH:MM.
pub fn format_minute(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

/// Cross the grid with the served directions, dropping departures already
/// persisted. An unchanged grid therefore yields no candidates at all, which
/// is what makes repeated generation calls idempotent.
pub fn departure_candidates(
    route_id: i64,
    date: &str,
    directions: &[Direction],
    minutes: &[u32],
    existing: &HashSet<(Direction, String)>,
) -> Vec<NewTrip> {
    let mut candidates = Vec::new();
    for direction in directions {
        for minute in minutes {
            let time = format_minute(*minute);
            if existing.contains(&(*direction, time.clone())) {
                continue;
            }
            candidates.push(NewTrip {
                route_id,
                service_date: date.to_string(),
                departure_time: time,
                direction: *direction,
            });
        }
    }
    candidates
}

/// Generate and persist upcoming trips for a route, same service day only.
///
/// `now` is the local reference instant; the effective horizon is clamped to
/// [30, 1440] minutes. Returns the number of rows actually inserted. The
/// call is idempotent: already-persisted departures are skipped up front,
/// and a concurrent generation losing the uniqueness race discards its batch
/// and reports zero because the winner persisted the same grid.
pub async fn ensure_upcoming_trips(
    store: &TimetableStore,
    route: &Route,
    now: NaiveDateTime,
    horizon_minutes: u32,
) -> Result<u32, EngineError> {
    let horizon = horizon_minutes.clamp(MIN_HORIZON_MINUTES, MAX_HORIZON_MINUTES);

    let window = route
        .operating_hours
        .as_deref()
        .and_then(window::parse_operating_window)
        .ok_or(EngineError::NoScheduleWindow)?;

    let directions = store.directions_with_stops(route.id).await?;
    if directions.is_empty() {
        return Ok(0);
    }

    let headway = headway::resolve_headway(
        route.frequency_minutes,
        route.trips_per_day,
        window.length_minutes(),
        directions.len(),
    )
    .ok_or(EngineError::NoFrequencyData)?;

    let now_minute = now.hour() * 60 + now.minute();
    let minutes = departure_grid(&window, headway, now_minute, horizon);
    if minutes.is_empty() {
        return Ok(0);
    }

    let date = now.date().format("%Y-%m-%d").to_string();
    let existing = store.existing_departures(route.id, &date).await?;
    let candidates = departure_candidates(route.id, &date, &directions, &minutes, &existing);
    if candidates.is_empty() {
        return Ok(0);
    }

    match store.insert_trips(&candidates).await? {
        TripInsertOutcome::Inserted(count) => {
            info!(
                route = %route.code,
                date = %date,
                inserted = count,
                headway,
                "Generated upcoming trips"
            );
            Ok(count)
        }
        TripInsertOutcome::Conflict => {
            debug!(
                route = %route.code,
                date = %date,
                "Concurrent generation won the race, batch discarded"
            );
            Ok(0)
        }
    }
}

/// One row of the route's upcoming-departures listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpcomingTrip {
    pub trip_id: i64,
    pub date: String,
    pub time: String,
    pub direction: Direction,
    /// Local ISO departure, absent when the stored fields do not parse
    pub departure_iso: Option<String>,
}

/// Today's not-yet-departed trips, soonest first, truncated to `limit`.
///
/// Rows whose stored date or time fail to parse cannot be compared against
/// the clock; they are kept and sorted last.
pub fn upcoming_trip_rows(trips: &[Trip], now: NaiveDateTime, limit: usize) -> Vec<UpcomingTrip> {
    let mut rows = Vec::new();
    for trip in trips {
        let departure = trip.departure();
        if matches!(departure, Some(dep) if dep < now) {
            continue;
        }
        rows.push(UpcomingTrip {
            trip_id: trip.id,
            date: trip.service_date.clone(),
            time: trip.departure_time.clone(),
            direction: trip.direction,
            departure_iso: departure.map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string()),
        });
    }

    rows.sort_by_key(|row| {
        (
            row.departure_iso.is_none(),
            row.departure_iso.clone().unwrap_or_default(),
            row.trip_id,
        )
    });
    rows.truncate(limit);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: u32, end: u32) -> OperatingWindow {
        OperatingWindow {
            start_minute: start,
            end_minute: end,
        }
    }

    fn trip(id: i64, date: &str, time: &str, direction: Direction) -> Trip {
        Trip {
            id,
            route_id: 1,
            service_date: date.to_string(),
            departure_time: time.to_string(),
            direction,
        }
    }

    #[test]
    fn grid_aligns_to_window_start() {
        // Window opens 05:30 with a 20-minute headway; at 09:58 the next
        // grid point is 10:10 (05:30 + 14 * 20), not 10:00.
        let grid = departure_grid(&window(330, 1140), 20, 598, 60);
        assert_eq!(grid, vec![610, 630, 650]);
    }

    #[test]
    fn grid_starts_at_window_open_before_service() {
        let grid = departure_grid(&window(330, 1140), 30, 0, 90);
        assert_eq!(grid, vec![330, 360, 390, 420]);
    }

    #[test]
    fn grid_is_empty_after_window_close() {
        assert!(departure_grid(&window(330, 600), 20, 601, 360).is_empty());
    }

    #[test]
    fn grid_point_on_now_is_kept() {
        let grid = departure_grid(&window(330, 1140), 20, 350, 40);
        assert_eq!(grid, vec![350, 370, 390]);
    }

    #[test]
    fn grid_clips_to_window_end() {
        let grid = departure_grid(&window(330, 400), 30, 330, 360);
        assert_eq!(grid, vec![330, 360, 390]);
    }

    #[test]
    fn minutes_format_zero_padded() {
        assert_eq!(format_minute(330), "05:30");
        assert_eq!(format_minute(5), "00:05");
        assert_eq!(format_minute(1140), "19:00");
    }

    #[test]
    fn candidates_cover_every_direction_and_minute() {
        let candidates = departure_candidates(
            1,
            "2025-06-12",
            &Direction::BOTH,
            &[610, 630],
            &HashSet::new(),
        );
        assert_eq!(candidates.len(), 4);
        assert!(candidates.iter().all(|c| c.route_id == 1));
        assert_eq!(candidates[0].departure_time, "10:10");
        assert_eq!(candidates[0].direction, Direction::Outbound);
        assert_eq!(candidates[3].departure_time, "10:30");
        assert_eq!(candidates[3].direction, Direction::Inbound);
    }

    #[test]
    fn already_persisted_grid_yields_no_candidates() {
        // Everything the first call inserted is in the existing set, so the
        // immediate second call has nothing left to write.
        let first = departure_candidates(
            1,
            "2025-06-12",
            &[Direction::Outbound],
            &[610, 630, 650],
            &HashSet::new(),
        );
        let existing: HashSet<(Direction, String)> = first
            .iter()
            .map(|c| (c.direction, c.departure_time.clone()))
            .collect();

        let second = departure_candidates(
            1,
            "2025-06-12",
            &[Direction::Outbound],
            &[610, 630, 650],
            &existing,
        );
        assert!(second.is_empty());
    }

    #[test]
    fn partially_persisted_grid_fills_only_the_gaps() {
        let existing: HashSet<(Direction, String)> =
            [(Direction::Outbound, "10:10".to_string())].into_iter().collect();
        let candidates = departure_candidates(
            1,
            "2025-06-12",
            &[Direction::Outbound],
            &[610, 630],
            &existing,
        );
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].departure_time, "10:30");
    }

    #[test]
    fn upcoming_rows_skip_departed_trips() {
        let now = NaiveDateTime::parse_from_str("2025-06-12 10:00", "%Y-%m-%d %H:%M").unwrap();
        let trips = vec![
            trip(1, "2025-06-12", "09:40", Direction::Outbound),
            trip(2, "2025-06-12", "10:00", Direction::Outbound),
            trip(3, "2025-06-12", "10:20", Direction::Inbound),
        ];
        let rows = upcoming_trip_rows(&trips, now, 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trip_id, 2);
        assert_eq!(rows[1].trip_id, 3);
    }

    #[test]
    fn unparseable_rows_sort_last_but_stay() {
        let now = NaiveDateTime::parse_from_str("2025-06-12 10:00", "%Y-%m-%d %H:%M").unwrap();
        let trips = vec![
            trip(1, "2025-06-12", "late morning", Direction::Outbound),
            trip(2, "2025-06-12", "10:30", Direction::Outbound),
        ];
        let rows = upcoming_trip_rows(&trips, now, 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trip_id, 2);
        assert_eq!(rows[1].trip_id, 1);
        assert!(rows[1].departure_iso.is_none());
    }

    #[test]
    fn upcoming_rows_truncate_to_limit() {
        let now = NaiveDateTime::parse_from_str("2025-06-12 06:00", "%Y-%m-%d %H:%M").unwrap();
        let trips: Vec<Trip> = (0..30)
            .map(|i| {
                trip(
                    i,
                    "2025-06-12",
                    &format_minute(400 + (i as u32) * 10),
                    Direction::Outbound,
                )
            })
            .collect();
        let rows = upcoming_trip_rows(&trips, now, 12);
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].time, "06:40");
    }
}
