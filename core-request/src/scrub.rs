//! Post-success response scrubbing.
//!
//! Replaces empty leaves (`null`, `""`) with a display placeholder and
//! normalizes date/time fields so UIs can render results without null
//! checks.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;

/// Placeholder used when no replacement string is configured.
pub const DEFAULT_PLACEHOLDER: &str = "-";

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn is_empty_leaf(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Recursively replace empty leaves with `replacement`.
///
/// Keys containing `date`/`Date` are reformatted as `YYYY-MM-DD` and keys
/// containing `time`/`Time` as `YYYY-MM-DD HH:mm:ss`; unparseable or empty
/// dates become `-`. Array elements are only descended into when they are
/// objects or arrays; scalar elements are left alone.
pub fn replace_empty(value: &mut Value, replacement: &str) {
    match value {
        Value::Array(items) => {
            for item in items.iter_mut().filter(|item| item.is_object() || item.is_array()) {
                replace_empty(item, replacement);
            }
        }
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if key.contains("date") || key.contains("Date") {
                    *field = Value::String(safe_format(field, DATE_FORMAT));
                } else if key.contains("time") || key.contains("Time") {
                    *field = Value::String(safe_format(field, DATE_TIME_FORMAT));
                } else if is_empty_leaf(field) {
                    *field = Value::String(replacement.to_string());
                } else if field.is_object() || field.is_array() {
                    replace_empty(field, replacement);
                }
            }
        }
        _ => {}
    }
}

/// Replace empty values of the named top-level fields only.
pub fn replace_fields_empty(value: &mut Value, fields: &[String], replacement: &str) {
    let Value::Object(map) = value else {
        return;
    };
    for field in fields {
        match map.get_mut(field) {
            Some(existing) if is_empty_leaf(existing) => {
                *existing = Value::String(replacement.to_string());
            }
            Some(_) => {}
            None => {
                map.insert(field.clone(), Value::String(replacement.to_string()));
            }
        }
    }
}

/// Format a date-like value, or `-` when it is empty or unparseable.
///
/// Accepts epoch milliseconds, RFC 3339 strings and the common
/// `YYYY-MM-DD[ HH:mm:ss]` / `YYYY/MM/DD` shapes.
pub fn safe_format(value: &Value, format: &str) -> String {
    parse_date(value)
        .map(|dt| dt.format(format).to_string())
        .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string())
}

fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Local
                .timestamp_millis_opt(millis)
                .single()
                .map(|dt| dt.naive_local())
        }
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}
