//! Duration and date parsing for query values.
//!
//! # Design Decisions
//! - Durations are signed milliseconds; a missing unit means seconds
//! - The duration pattern is unanchored: the first run of digits wins
//! - Dates resolve to epoch milliseconds; naive ISO timestamps are UTC
//! - Integers below 1,000,000 are not treated as epoch milliseconds

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-)?(\d+)(ms|s|m|h|d|w)?").expect("valid duration pattern"));

static YEAR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-").expect("valid year pattern"));

/// Smallest integer accepted as an epoch-millisecond timestamp.
const MIN_EPOCH_MS: i64 = 1_000_000;

const SECOND_MS: i64 = 1000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Parse `-?\d+(ms|s|m|h|d|w)?` into signed milliseconds.
pub fn parse_duration_ms(input: &str) -> Option<i64> {
    let caps = DURATION_PATTERN.captures(input)?;
    let magnitude: i64 = caps.get(2)?.as_str().parse().ok()?;
    let unit_ms = match caps.get(3).map(|m| m.as_str()) {
        Some("ms") => 1,
        Some("m") => MINUTE_MS,
        Some("h") => HOUR_MS,
        Some("d") => DAY_MS,
        Some("w") => WEEK_MS,
        _ => SECOND_MS,
    };
    let ms = magnitude.checked_mul(unit_ms)?;
    if caps.get(1).is_some() {
        Some(-ms)
    } else {
        Some(ms)
    }
}

/// Lenient base-10 integer parse: optional whitespace and sign, then as many
/// digits as are present. Trailing garbage is ignored.
pub fn parse_leading_integer(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let value: i64 = rest[..digits].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Resolve a flexible date expression to epoch milliseconds.
///
/// Tried in order: ISO-8601 (when the value starts with a 4-digit year),
/// epoch milliseconds, a duration relative to `now_ms`, then a handful of
/// generic date layouts.
pub fn parse_flexible_date(input: &str, now_ms: i64) -> Option<i64> {
    if YEAR_PREFIX.is_match(input) {
        if let Some(ms) = parse_iso8601(input) {
            return Some(ms);
        }
    }

    if let Some(ms) = parse_leading_integer(input) {
        if ms >= MIN_EPOCH_MS {
            return Some(ms);
        }
    }

    if let Some(ms) = parse_duration_ms(input).and_then(|offset| now_ms.checked_add(offset)) {
        return Some(ms);
    }

    parse_generic_date(input)
}

fn parse_iso8601(input: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp_millis());
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, layout) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn parse_generic_date(input: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.timestamp_millis());
    }
    for layout in ["%Y/%m/%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, layout) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    for layout in ["%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(input, layout) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc().timestamp_millis());
        }
    }
    None
}
