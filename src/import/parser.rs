//! Tokenizer for the semi-structured "status updates" field carried by
//! carrier CSV exports.
//!
//! The field packs a whole status history into one string: entries separated
//! by `|`, each entry a whitespace-separated token run of the form
//! `<status> [location words...] [D/M/YYYY [H:MM] ...]`. The parser never
//! fails on garbage input; it only produces weaker events (missing location,
//! missing timestamp).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// A 1-2 digit day, 1-2 digit month, 4 digit year. The first token matching
/// this pattern marks where the location text ends and the timestamp begins.
static DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}/\d{1,2}/\d{4}").expect("date token pattern"));

/// One structured status event, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatusEvent {
    /// First token of the entry, e.g. `picked_up`.
    pub status_type: String,
    /// Tokens between the status and the date token, joined with spaces.
    pub location: Option<String>,
    /// The date token and everything after it, joined with spaces, unparsed.
    pub timestamp_text: Option<String>,
}

impl RawStatusEvent {
    /// Best-effort timestamp. `None` when the entry carried no date token or
    /// the date text does not name a real calendar day; the reconciler then
    /// substitutes the merge wall-clock.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp_text.as_deref().and_then(parse_event_timestamp)
    }
}

impl fmt::Display for RawStatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_type)?;
        if let Some(location) = &self.location {
            write!(f, " {location}")?;
        }
        if let Some(timestamp) = &self.timestamp_text {
            write!(f, " {timestamp}")?;
        }
        Ok(())
    }
}

/// Parses a raw pipe-delimited status-updates field into structured events,
/// left to right. Lazy and restartable: call again on the same input to
/// re-iterate. Entries that trim to nothing yield no event.
pub fn parse_status_updates(raw: &str) -> impl Iterator<Item = RawStatusEvent> + '_ {
    raw.split('|').filter_map(parse_entry)
}

fn parse_entry(entry: &str) -> Option<RawStatusEvent> {
    let tokens: Vec<&str> = entry.split_whitespace().collect();
    let (status_type, rest) = tokens.split_first()?;

    let date_idx = rest.iter().position(|token| DATE_TOKEN.is_match(token));
    let (location, timestamp_text) = match date_idx {
        Some(idx) => (join_tokens(&rest[..idx]), Some(rest[idx..].join(" "))),
        None => (join_tokens(rest), None),
    };

    Some(RawStatusEvent {
        status_type: (*status_type).to_string(),
        location,
        timestamp_text,
    })
}

fn join_tokens(tokens: &[&str]) -> Option<String> {
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Parses a timestamp string captured by [`parse_status_updates`]: a
/// day-first `D/M/YYYY` date, optionally followed by an `H:MM[:SS]` time.
/// Trailing garbage after the recognized portion is tolerated; an invalid
/// calendar date degrades to `None`.
pub fn parse_event_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let matched = DATE_TOKEN.find(text)?;
    let date = NaiveDate::parse_from_str(matched.as_str(), "%d/%m/%Y").ok()?;

    let time = text[matched.end()..]
        .split_whitespace()
        .next()
        .and_then(|token| {
            NaiveTime::parse_from_str(token, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M:%S"))
                .ok()
        })
        .unwrap_or(NaiveTime::MIN);

    Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

/// Lenient date parsing for loosely formatted source fields such as the CSV
/// ETA column: RFC 3339, then `YYYY-MM-DD`, then the day-first slash form.
pub fn parse_flexible_date(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, NaiveTime::MIN)));
    }
    parse_event_timestamp(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn parse_all(raw: &str) -> Vec<RawStatusEvent> {
        parse_status_updates(raw).collect()
    }

    #[test]
    fn splits_entries_and_extracts_fields() {
        let events = parse_all(
            "picked_up Warehouse-A 1/2/2024 | intransit Hub-B 3/2/2024 | delivered Customer-Door 5/2/2024",
        );
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].status_type, "picked_up");
        assert_eq!(events[0].location.as_deref(), Some("Warehouse-A"));
        assert_eq!(events[0].timestamp_text.as_deref(), Some("1/2/2024"));
        assert_eq!(events[2].status_type, "delivered");
        assert_eq!(events[2].location.as_deref(), Some("Customer-Door"));
    }

    #[test]
    fn status_only_entry_has_no_location_or_timestamp() {
        let events = parse_all("delivered");
        assert_eq!(
            events,
            vec![RawStatusEvent {
                status_type: "delivered".to_string(),
                location: None,
                timestamp_text: None,
            }]
        );
    }

    #[test]
    fn entry_without_date_puts_everything_into_location() {
        let events = parse_all("intransit Sorting Facility East Wing");
        assert_eq!(events[0].location.as_deref(), Some("Sorting Facility East Wing"));
        assert!(events[0].timestamp_text.is_none());
        assert!(events[0].parsed_timestamp().is_none());
    }

    #[test]
    fn blank_entries_are_skipped() {
        let events = parse_all(" | picked_up 1/2/2024 |   | ");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status_type, "picked_up");
        assert!(events[0].location.is_none());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_all("").is_empty());
        assert!(parse_all("   ").is_empty());
    }

    #[test]
    fn first_date_token_bounds_the_location() {
        let events = parse_all("intransit Hub 3/2/2024 10:45 revised 4/2/2024");
        assert_eq!(events[0].location.as_deref(), Some("Hub"));
        // Everything from the first date token onward is timestamp text.
        assert_eq!(
            events[0].timestamp_text.as_deref(),
            Some("3/2/2024 10:45 revised 4/2/2024")
        );
        let ts = events[0].parsed_timestamp().unwrap();
        assert_eq!((ts.day(), ts.month(), ts.year()), (3, 2, 2024));
    }

    #[test]
    fn timestamp_with_time_component() {
        let ts = parse_event_timestamp("5/2/2024 14:30").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-02-05T14:30:00+00:00");
    }

    #[test]
    fn invalid_calendar_date_degrades_to_none() {
        assert!(parse_event_timestamp("31/2/2024").is_none());
        assert!(parse_event_timestamp("not a date").is_none());
    }

    #[test]
    fn trailing_garbage_after_date_is_tolerated() {
        let ts = parse_event_timestamp("5/2/2024 (approx)").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-02-05T00:00:00+00:00");
    }

    #[test]
    fn restartable_iteration_yields_same_events() {
        let raw = "picked_up A 1/2/2024 | delivered B 2/2/2024";
        assert_eq!(parse_all(raw), parse_all(raw));
    }

    #[test]
    fn rendering_round_trips_modulo_whitespace() {
        let raw = "picked_up   Warehouse-A   1/2/2024 |  delivered Customer-Door 5/2/2024 16:00";
        let rendered: Vec<String> = parse_status_updates(raw).map(|e| e.to_string()).collect();
        assert_eq!(
            rendered.join(" | "),
            "picked_up Warehouse-A 1/2/2024 | delivered Customer-Door 5/2/2024 16:00"
        );
    }

    #[test]
    fn flexible_date_accepts_common_forms() {
        assert!(parse_flexible_date("2024-02-05").is_some());
        assert!(parse_flexible_date("2024-02-05T10:00:00Z").is_some());
        assert!(parse_flexible_date("5/2/2024").is_some());
        assert!(parse_flexible_date("soon").is_none());
    }
}
