//! Timestamp parsing and rendering at the CLI boundary.
//!
//! The core compares opaque epoch milliseconds; timezones are resolved here
//! once and never again.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parses RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` read as UTC, into
/// epoch milliseconds.
pub fn parse_timestamp_ms(raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.timestamp_millis());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
        .ok_or_else(|| {
            format!("invalid timestamp `{trimmed}`; expected RFC 3339 or YYYY-MM-DDTHH:MM[:SS]")
        })
}

/// Renders epoch milliseconds as RFC 3339 UTC.
pub fn format_timestamp_ms(value: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(value).map_or_else(
        || value.to_string(),
        |parsed| parsed.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}
