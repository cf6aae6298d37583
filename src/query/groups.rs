//! Built-in parse groups.
//!
//! Each group owns a fixed set of raw keys: it removes them from the working
//! copy of the query and records fields, errors or warnings in the result.
//! Malformed values never abort a run; they become an error message and the
//! field is left out.

use std::fmt;

use chrono::Utc;

use super::raw::{QueryValue, RawQuery};
use super::result::{FieldValue, ParseResult};
use super::time::{parse_duration_ms, parse_flexible_date, parse_leading_integer};

/// Sentinel for "no time bucketing / no aggregation".
pub const RAW: &str = "raw";
/// Aggregation applied when none is given.
pub const DEFAULT_AGG: &str = "mean";
/// Accepted `agg` values.
pub const AGGREGATIONS: [&str; 5] = ["raw", "min", "max", "mean", "median"];
/// `duration` default, in seconds.
pub const DEFAULT_DURATION_SECS: i64 = 5;
/// `interval` default before conversion.
pub const DEFAULT_INTERVAL: &str = "1s";

/// Keys that are registered as plain passthrough groups out of the box.
pub const PASSTHROUGH_KEYS: [&str; 14] = [
    "id", "app", "key", "val", "name", "data", "asset", "type", "firstName", "lastName", "email",
    "company", "optOut", "license",
];

/// A named unit of query parsing and validation.
pub trait Group: Send + Sync + fmt::Debug {
    /// Consume the keys this group owns from `query` and record the outcome
    /// in `out`. `required` is set when the group token carried a `!`.
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, required: bool);
}

/// Take a key that should appear once. Repeats keep the first value and are
/// reported as an error.
fn take_single(query: &mut RawQuery, out: &mut ParseResult, prop: &str) {
    let value = match query.take(prop) {
        Some(v) => v,
        None => return,
    };

    match value {
        QueryValue::Single(v) => out.set(prop, v),
        QueryValue::Multi(vs) => {
            if let Some(first) = vs.into_iter().next() {
                out.set(prop, first);
            }
            out.error(format!("query string parameter \"{prop}\" specified more than once"));
        }
    }
}

/// Take a key that may repeat; the field is always a list.
fn take_multi(query: &mut RawQuery, out: &mut ParseResult, prop_in: &str, prop_out: &str) {
    let values = match query.take(prop_in) {
        Some(QueryValue::Single(v)) => vec![v],
        Some(QueryValue::Multi(vs)) => vs,
        None => return,
    };
    out.set(prop_out, FieldValue::List(values));
}

/// A single same-named key, copied through untouched.
#[derive(Debug, Clone)]
pub struct PassthroughGroup {
    key: String,
}

impl PassthroughGroup {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Group for PassthroughGroup {
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, required: bool) {
        take_single(query, out, &self.key);
        if required && !out.contains(&self.key) {
            out.error(format!("query string parameter {} is required", self.key));
        }
    }
}

/// Which agents a query targets: one `id`, or any mix of app/tags/hostname.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentScopeGroup;

impl Group for AgentScopeGroup {
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, _required: bool) {
        take_single(query, out, "id");
        take_single(query, out, "app");
        take_multi(query, out, "tag", "tags");
        take_single(query, out, "hostname");

        let has_id = out.get("id").is_some_and(FieldValue::is_truthy);
        if !has_id {
            return;
        }

        for shadowed in ["app", "tags", "hostname"] {
            if out.remove(shadowed).is_some() {
                out.warn(format!("id already specified, {shadowed} ignored"));
            }
        }
    }
}

/// `duration` in whole seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationGroup;

impl Group for DurationGroup {
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, _required: bool) {
        take_single(query, out, "duration");

        let raw = match out.text("duration") {
            Some(text) => text.to_string(),
            None => {
                out.set("duration", DEFAULT_DURATION_SECS);
                return;
            }
        };

        match parse_leading_integer(&raw) {
            Some(secs) => out.set("duration", secs),
            None => {
                out.error(format!("invalid duration format \"{raw}\""));
                out.remove("duration");
            }
        }
    }
}

/// `name` with optional `data`; data makes no sense on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameDataGroup;

impl Group for NameDataGroup {
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, _required: bool) {
        take_single(query, out, "name");
        take_single(query, out, "data");

        if !out.contains("name") && out.contains("data") {
            out.error("must specify name if specifying data");
            out.remove("data");
        }
    }
}

/// Repeated `field` keys collected as `fields`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldsGroup;

impl Group for FieldsGroup {
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, _required: bool) {
        take_multi(query, out, "field", "fields");
    }
}

/// Bucketing `interval`, stored as milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalGroup;

impl Group for IntervalGroup {
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, _required: bool) {
        take_single(query, out, "interval");

        let raw = out.text("interval").unwrap_or(DEFAULT_INTERVAL).to_string();
        match parse_duration_ms(&raw) {
            Some(ms) => out.set("interval", ms),
            None => {
                out.error(format!("invalid interval value {raw}"));
                out.remove("interval");
            }
        }
    }
}

/// Time range bounds, stored as epoch milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartEndGroup;

impl StartEndGroup {
    fn resolve(out: &mut ParseResult, prop: &str, now_ms: i64) {
        let raw = match out.text(prop) {
            Some(text) => text.to_string(),
            None => return,
        };
        match parse_flexible_date(&raw, now_ms) {
            Some(ms) => out.set(prop, ms),
            None => {
                out.error(format!("invalid {prop} value \"{raw}\""));
                out.remove(prop);
            }
        }
    }
}

impl Group for StartEndGroup {
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, _required: bool) {
        take_single(query, out, "start");
        take_single(query, out, "end");

        if !out.contains("start") && out.contains("end") {
            out.remove("end");
            out.error("start must be specified if end is specified");
            return;
        }

        let now_ms = Utc::now().timestamp_millis();
        Self::resolve(out, "start", now_ms);
        Self::resolve(out, "end", now_ms);
    }
}

/// Aggregation function name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggGroup;

impl Group for AggGroup {
    fn parse(&self, query: &mut RawQuery, out: &mut ParseResult, _required: bool) {
        take_single(query, out, "agg");

        let agg = match out.text("agg") {
            Some(agg) => agg.to_string(),
            None => {
                out.set("agg", DEFAULT_AGG);
                return;
            }
        };

        if !AGGREGATIONS.contains(&agg.as_str()) {
            out.error(format!("invalid agg value {agg}"));
            out.remove("agg");
        }
    }
}
