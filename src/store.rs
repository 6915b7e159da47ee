//! SQLite persistence for routes, stops and generated trips.

use std::collections::HashSet;

use sqlx::SqlitePool;

use crate::models::{Direction, NewTrip, Route, Stop, Trip};

/// Outcome of a batch trip insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripInsertOutcome {
    /// Every candidate was written.
    Inserted(u32),
    /// A concurrent writer hit the uniqueness index first. The whole batch
    /// was rolled back; the winner already persisted the same grid.
    Conflict,
}

type RouteRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<f64>,
    Option<String>,
    Option<String>,
);

type StopRow = (
    i64,
    i64,
    String,
    Option<String>,
    Option<f64>,
    Option<f64>,
    i64,
    String,
);

type TripRow = (i64, i64, String, String, String);

fn route_from_row(row: RouteRow) -> Route {
    Route {
        id: row.0,
        code: row.1,
        name: row.2,
        start_point: row.3,
        end_point: row.4,
        operating_hours: row.5,
        frequency_minutes: row.6,
        trips_per_day: row.7,
        distance_km: row.8,
        fare: row.9,
        notes: row.10,
    }
}

fn stop_from_row(row: StopRow) -> Stop {
    Stop {
        id: row.0,
        route_id: row.1,
        name: row.2,
        address: row.3,
        lat: row.4,
        lng: row.5,
        stop_order: row.6,
        direction: Direction::parse(&row.7),
    }
}

fn trip_from_row(row: TripRow) -> Trip {
    Trip {
        id: row.0,
        route_id: row.1,
        service_date: row.2,
        departure_time: row.3,
        direction: Direction::parse(&row.4),
    }
}

/// Read/write interface over the schedule tables.
#[derive(Clone)]
pub struct TimetableStore {
    pool: SqlitePool,
}

impl TimetableStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All routes, ordered by public code.
    pub async fn routes(&self) -> Result<Vec<Route>, sqlx::Error> {
        let rows: Vec<RouteRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, start_point, end_point, operating_hours,
                   frequency_minutes, trips_per_day, distance_km, fare, notes
            FROM routes
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(route_from_row).collect())
    }

    pub async fn route(&self, route_id: i64) -> Result<Option<Route>, sqlx::Error> {
        let row: Option<RouteRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, start_point, end_point, operating_hours,
                   frequency_minutes, trips_per_day, distance_km, fare, notes
            FROM routes
            WHERE id = ?
            "#,
        )
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(route_from_row))
    }

    /// The stops of one direction in boarding sequence. Ties on the stored
    /// order fall back to the insertion id so the sequence stays stable.
    pub async fn stops_for_direction(
        &self,
        route_id: i64,
        direction: Direction,
    ) -> Result<Vec<Stop>, sqlx::Error> {
        let rows: Vec<StopRow> = sqlx::query_as(
            r#"
            SELECT id, route_id, name, address, lat, lng, stop_order, direction
            FROM stops
            WHERE route_id = ? AND direction = ?
            ORDER BY stop_order, id
            "#,
        )
        .bind(route_id)
        .bind(direction.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(stop_from_row).collect())
    }

    pub async fn stop(&self, stop_id: i64) -> Result<Option<Stop>, sqlx::Error> {
        let row: Option<StopRow> = sqlx::query_as(
            r#"
            SELECT id, route_id, name, address, lat, lng, stop_order, direction
            FROM stops
            WHERE id = ?
            "#,
        )
        .bind(stop_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(stop_from_row))
    }

    /// The directions that actually carry stop data for a route, in
    /// canonical order (outbound first).
    pub async fn directions_with_stops(
        &self,
        route_id: i64,
    ) -> Result<Vec<Direction>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT direction FROM stops WHERE route_id = ?")
                .bind(route_id)
                .fetch_all(&self.pool)
                .await?;

        let present: HashSet<Direction> =
            rows.iter().map(|(raw,)| Direction::parse(raw)).collect();
        Ok(Direction::BOTH
            .into_iter()
            .filter(|d| present.contains(d))
            .collect())
    }

    /// Stop count and coordinate-bearing stop count for one direction.
    pub async fn direction_stop_stats(
        &self,
        route_id: i64,
        direction: Direction,
    ) -> Result<(i64, i64), sqlx::Error> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN lat IS NOT NULL AND lng IS NOT NULL THEN 1 ELSE 0 END), 0)
            FROM stops
            WHERE route_id = ? AND direction = ?
            "#,
        )
        .bind(route_id)
        .bind(direction.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// All trips of a route on a service date, ordered by departure.
    pub async fn trips_for_date(
        &self,
        route_id: i64,
        service_date: &str,
    ) -> Result<Vec<Trip>, sqlx::Error> {
        let rows: Vec<TripRow> = sqlx::query_as(
            r#"
            SELECT id, route_id, service_date, departure_time, direction
            FROM trips
            WHERE route_id = ? AND service_date = ?
            ORDER BY departure_time, direction, id
            "#,
        )
        .bind(route_id)
        .bind(service_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(trip_from_row).collect())
    }

    /// Trips of one direction on a service date, ordered by departure.
    pub async fn trips_for_direction(
        &self,
        route_id: i64,
        service_date: &str,
        direction: Direction,
    ) -> Result<Vec<Trip>, sqlx::Error> {
        let rows: Vec<TripRow> = sqlx::query_as(
            r#"
            SELECT id, route_id, service_date, departure_time, direction
            FROM trips
            WHERE route_id = ? AND service_date = ? AND direction = ?
            ORDER BY departure_time, id
            "#,
        )
        .bind(route_id)
        .bind(service_date)
        .bind(direction.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(trip_from_row).collect())
    }

    pub async fn trip(&self, trip_id: i64) -> Result<Option<Trip>, sqlx::Error> {
        let row: Option<TripRow> = sqlx::query_as(
            r#"
            SELECT id, route_id, service_date, departure_time, direction
            FROM trips
            WHERE id = ?
            "#,
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(trip_from_row))
    }

    /// The (direction, departure time) pairs already persisted for a route
    /// and date, for candidate de-duplication before an insert.
    pub async fn existing_departures(
        &self,
        route_id: i64,
        service_date: &str,
    ) -> Result<HashSet<(Direction, String)>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT direction, departure_time
            FROM trips
            WHERE route_id = ? AND service_date = ?
            "#,
        )
        .bind(route_id)
        .bind(service_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(direction, time)| (Direction::parse(&direction), time))
            .collect())
    }

    /// Insert generated trips in a single transaction.
    ///
    /// The unique index on (route, date, time, direction) is the concurrency
    /// control: when another writer got there first the batch rolls back and
    /// the caller treats the generation as already done.
    pub async fn insert_trips(
        &self,
        candidates: &[NewTrip],
    ) -> Result<TripInsertOutcome, sqlx::Error> {
        if candidates.is_empty() {
            return Ok(TripInsertOutcome::Inserted(0));
        }

        let mut tx = self.pool.begin().await?;
        for trip in candidates {
            let result = sqlx::query(
                r#"
                INSERT INTO trips (route_id, service_date, departure_time, direction)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(trip.route_id)
            .bind(&trip.service_date)
            .bind(&trip.departure_time)
            .bind(trip.direction.as_str())
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    tx.rollback().await?;
                    return Ok(TripInsertOutcome::Conflict);
                }
                Err(e) => return Err(e),
            }
        }
        tx.commit().await?;

        Ok(TripInsertOutcome::Inserted(candidates.len() as u32))
    }

    /// Cheap connectivity probe for the health endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Row counts for the health endpoint.
    pub async fn table_counts(&self) -> Result<(i64, i64, i64), sqlx::Error> {
        let (routes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM routes")
            .fetch_one(&self.pool)
            .await?;
        let (stops,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stops")
            .fetch_one(&self.pool)
            .await?;
        let (trips,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trips")
            .fetch_one(&self.pool)
            .await?;
        Ok((routes, stops, trips))
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_rows_parse_their_direction_leniently() {
        let stop = stop_from_row((
            3,
            1,
            "Market Square".to_string(),
            None,
            Some(48.37),
            Some(10.89),
            2,
            "INBOUND".to_string(),
        ));
        assert_eq!(stop.direction, Direction::Inbound);

        let stop = stop_from_row((
            4,
            1,
            "Old Mill".to_string(),
            None,
            None,
            None,
            3,
            "whatever".to_string(),
        ));
        assert_eq!(stop.direction, Direction::Outbound);
        assert!(!stop.has_coordinates());
    }

    #[test]
    fn route_rows_keep_optional_fields_optional() {
        let route = route_from_row((
            1,
            "12B".to_string(),
            "Harbor loop".to_string(),
            None,
            None,
            Some("05:30 - 19:00".to_string()),
            None,
            Some(40),
            None,
            None,
            None,
        ));
        assert_eq!(route.code, "12B");
        assert_eq!(route.trips_per_day, Some(40));
        assert!(route.frequency_minutes.is_none());
    }
}
