//! Headway resolution from operator metadata.

/// Bounds on a headway derived from a daily trip count. Derived values
/// outside this range are clamped rather than rejected.
const MIN_HEADWAY_MINUTES: u32 = 5;
const MAX_HEADWAY_MINUTES: u32 = 180;

/// Resolve the minutes between consecutive departures for one direction.
///
/// An explicit positive frequency wins outright. Otherwise the daily trip
/// count is spread evenly over the operating window. The count is a
/// network-wide total across both directions, so it is divided by the
/// effective direction count first. A single trip per direction cannot be
/// spaced, so it yields None, as does absent data.
pub fn resolve_headway(
    frequency_minutes: Option<i64>,
    trips_per_day: Option<i64>,
    window_minutes: u32,
    directions_with_stops: usize,
) -> Option<u32> {
    if let Some(freq) = frequency_minutes.filter(|f| *f > 0) {
        return u32::try_from(freq).ok();
    }

    let trips_total = trips_per_day?;
    if trips_total <= 1 || window_minutes == 0 {
        return None;
    }

    let directions = effective_direction_count(directions_with_stops);
    let per_direction = ((trips_total as f64 / directions as f64).round() as i64).max(1);
    if per_direction <= 1 {
        return None;
    }

    let headway = (window_minutes as f64 / (per_direction - 1) as f64).round() as u32;
    Some(headway.clamp(MIN_HEADWAY_MINUTES, MAX_HEADWAY_MINUTES))
}

/// The published trips-per-day counts both directions. When stop data exists
/// for only one, the split still assumes service runs both ways.
pub fn effective_direction_count(directions_with_stops: usize) -> usize {
    if directions_with_stops == 1 {
        2
    } else {
        directions_with_stops.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_frequency_wins() {
        assert_eq!(resolve_headway(Some(20), Some(100), 600, 2), Some(20));
        assert_eq!(resolve_headway(Some(7), None, 0, 0), Some(7));
    }

    #[test]
    fn non_positive_frequency_falls_through_to_trip_count() {
        // 40 trips over 2 directions in a 600-minute window: 600/19 ~ 32.
        assert_eq!(resolve_headway(Some(0), Some(40), 600, 2), Some(32));
        assert_eq!(resolve_headway(Some(-5), Some(40), 600, 2), Some(32));
    }

    #[test]
    fn trip_count_spreads_over_window() {
        // 20 trips on a single-direction dataset split across an assumed two
        // directions: 10 per direction, 9 gaps over 600 minutes -> 67.
        assert_eq!(resolve_headway(None, Some(20), 600, 1), Some(67));
        // Same count with both directions surveyed gives the same split.
        assert_eq!(resolve_headway(None, Some(20), 600, 2), Some(67));
    }

    #[test]
    fn too_few_trips_is_none() {
        assert_eq!(resolve_headway(None, Some(1), 600, 2), None);
        assert_eq!(resolve_headway(None, Some(0), 600, 2), None);
        // Two trips across two directions leave one per direction.
        assert_eq!(resolve_headway(None, Some(2), 600, 2), None);
    }

    #[test]
    fn absent_data_is_none() {
        assert_eq!(resolve_headway(None, None, 600, 2), None);
        assert_eq!(resolve_headway(None, Some(12), 0, 2), None);
    }

    #[test]
    fn derived_headway_is_clamped() {
        // 500 trips per direction in a short window would give < 5 minutes.
        assert_eq!(resolve_headway(None, Some(1000), 300, 2), Some(5));
        // Two per direction over a full day would give 1440.
        assert_eq!(resolve_headway(None, Some(4), 1440, 2), Some(180));
    }

    #[test]
    fn more_trips_never_lengthen_the_headway() {
        let mut last = u32::MAX;
        for trips in (4..600).step_by(4) {
            if let Some(h) = resolve_headway(None, Some(trips), 720, 2) {
                assert!(h <= last, "headway grew from {last} to {h} at {trips} trips");
                last = h;
            }
        }
        assert_eq!(last, MIN_HEADWAY_MINUTES);
    }

    #[test]
    fn single_direction_data_still_splits_by_two() {
        assert_eq!(effective_direction_count(1), 2);
        assert_eq!(effective_direction_count(2), 2);
        assert_eq!(effective_direction_count(0), 1);
    }
}
