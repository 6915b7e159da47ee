//! Operating-window extraction from free-text schedule descriptions.

use std::sync::LazyLock;

use regex::Regex;

/// A time-of-day mention such as "05:30", "05-30" or "5h30".
static TIME_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s*[:h\-]\s*(\d{2})").unwrap());

/// Daily operating window in minutes after local midnight. The end always
/// lies strictly after the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    pub start_minute: u32,
    pub end_minute: u32,
}

impl OperatingWindow {
    pub fn length_minutes(&self) -> u32 {
        self.end_minute - self.start_minute
    }

    pub fn start_second(&self) -> u32 {
        self.start_minute * 60
    }

    pub fn end_second(&self) -> u32 {
        self.end_minute * 60
    }
}

/// Extract the daily operating window from a free-text description.
///
/// The first two time mentions in the text are taken as start and end,
/// whatever prose surrounds them. Returns None when fewer than two mentions
/// are present, a component is out of range, or the end does not lie
/// strictly after the start. A missing window is an expected data condition
/// that callers handle by refusing to schedule, not an error.
pub fn parse_operating_window(raw: &str) -> Option<OperatingWindow> {
    let lowered = raw.to_lowercase();
    let mut mentions = TIME_MENTION.captures_iter(&lowered);

    let start = minute_of_day(&mentions.next()?)?;
    let end = minute_of_day(&mentions.next()?)?;
    if end <= start {
        return None;
    }

    Some(OperatingWindow {
        start_minute: start,
        end_minute: end,
    })
}

fn minute_of_day(mention: &regex::Captures<'_>) -> Option<u32> {
    let hour: u32 = mention[1].parse().ok()?;
    let minute: u32 = mention[2].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_separated_times() {
        let window = parse_operating_window("05:30 - 19:00").unwrap();
        assert_eq!(window.start_minute, 330);
        assert_eq!(window.end_minute, 1140);
        assert_eq!(window.length_minutes(), 810);
    }

    #[test]
    fn parses_dash_and_h_separators() {
        let window = parse_operating_window("06-00 to 22-30").unwrap();
        assert_eq!((window.start_minute, window.end_minute), (360, 1350));

        let window = parse_operating_window("daily 5h45 until 23h15").unwrap();
        assert_eq!((window.start_minute, window.end_minute), (345, 1395));
    }

    #[test]
    fn separator_casing_and_spacing_are_tolerated() {
        let window = parse_operating_window("05H30 / 19 : 00").unwrap();
        assert_eq!((window.start_minute, window.end_minute), (330, 1140));
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let window = parse_operating_window("weekdays from 06:15 and last bus 21:45").unwrap();
        assert_eq!((window.start_minute, window.end_minute), (375, 1305));
    }

    #[test]
    fn fewer_than_two_mentions_is_none() {
        assert!(parse_operating_window("").is_none());
        assert!(parse_operating_window("around 07:00").is_none());
        assert!(parse_operating_window("all day service").is_none());
    }

    #[test]
    fn out_of_range_components_are_none() {
        assert!(parse_operating_window("24:00 - 25:00").is_none());
        assert!(parse_operating_window("05:75 - 19:00").is_none());
    }

    #[test]
    fn end_must_lie_after_start() {
        assert!(parse_operating_window("19:00 - 05:30").is_none());
        assert!(parse_operating_window("08:00 - 08:00").is_none());
    }
}
