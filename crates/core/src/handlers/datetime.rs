//! Temporal column handler.
//!
//! Parses ISO-8601 first, then a fixed fallback list of legacy formats
//! seen in assessor source extracts. Equality is evaluated at a
//! configurable precision (default: second).

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use serde_json::Value;

use super::DatetimePrecision;

/// Legacy formats tried, in order, after ISO-8601 fails.
const FALLBACK_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];

/// Date-only formats with ambiguous day/month order; day-first wins.
const FALLBACK_DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%m/%d/%Y"];

pub fn can_handle(tag: &str) -> bool {
    ["timestamptz", "timestamp", "datetime", "date", "time"]
        .iter()
        .any(|t| tag.starts_with(t))
        && !tag.ends_with("[]")
}

/// Parse a value into a UTC datetime. Date-only inputs land at midnight.
pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // ISO without offset, e.g. "2026-08-06T14:30:00".
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    for fmt in FALLBACK_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    for fmt in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    None
}

/// Normalize to canonical RFC 3339 (microsecond precision, UTC).
pub fn extract(raw: &Value) -> Option<Value> {
    let parsed = parse(raw);
    if parsed.is_none() {
        tracing::warn!(value = %raw, "Unparseable datetime");
    }
    parsed.map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Micros, true)))
}

/// Equality at the configured precision.
pub fn compare(a: &Value, b: &Value, precision: DatetimePrecision) -> bool {
    match (parse(a), parse(b)) {
        (Some(da), Some(db)) => truncate(da, precision) == truncate(db, precision),
        _ => {
            tracing::warn!("Unparseable datetime pair; treating as differing");
            false
        }
    }
}

/// Re-render at the requested precision (used by cross-type transforms).
pub fn transform(value: &Value, precision: DatetimePrecision) -> Option<Value> {
    let dt = parse(value)?;
    let rendered = match precision {
        DatetimePrecision::Day => dt.format("%Y-%m-%d").to_string(),
        DatetimePrecision::Hour => dt.format("%Y-%m-%dT%H:00:00Z").to_string(),
        DatetimePrecision::Minute => dt.format("%Y-%m-%dT%H:%M:00Z").to_string(),
        DatetimePrecision::Second => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        DatetimePrecision::Microsecond => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
    };
    Some(Value::String(rendered))
}

fn truncate(dt: DateTime<Utc>, precision: DatetimePrecision) -> DateTime<Utc> {
    let result = match precision {
        DatetimePrecision::Day => dt
            .with_hour(0)
            .and_then(|d| d.with_minute(0))
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0)),
        DatetimePrecision::Hour => dt
            .with_minute(0)
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0)),
        DatetimePrecision::Minute => dt.with_second(0).and_then(|d| d.with_nanosecond(0)),
        DatetimePrecision::Second => dt.with_nanosecond(0),
        DatetimePrecision::Microsecond => {
            dt.with_nanosecond(dt.nanosecond() / 1_000 * 1_000)
        }
    };
    result.unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claims_temporal_tags() {
        assert!(can_handle("timestamptz"));
        assert!(can_handle("timestamp with time zone"));
        assert!(can_handle("date"));
        assert!(!can_handle("text"));
        assert!(!can_handle("timestamp[]"));
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse(&json!("2026-08-06T14:30:00+02:00")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-08-06T12:30:00+00:00");
    }

    #[test]
    fn parses_iso_without_offset() {
        assert!(parse(&json!("2026-08-06T14:30:00")).is_some());
    }

    #[test]
    fn parses_space_separated_fallback() {
        assert!(parse(&json!("2026-08-06 14:30:00")).is_some());
    }

    #[test]
    fn parses_date_only() {
        let dt = parse(&json!("2026-08-06")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-08-06T00:00:00+00:00");
    }

    #[test]
    fn slash_dates_prefer_day_first() {
        let dt = parse(&json!("03/04/2026")).unwrap();
        // 3 April, not 4 March.
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2026-04-03");
    }

    #[test]
    fn month_first_used_when_day_first_impossible() {
        let dt = parse(&json!("12/25/2026")).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2026-12-25");
    }

    #[test]
    fn second_precision_ignores_subsecond_noise() {
        let a = json!("2026-08-06T14:30:00.123Z");
        let b = json!("2026-08-06T14:30:00.987Z");
        assert!(compare(&a, &b, DatetimePrecision::Second));
        assert!(!compare(&a, &b, DatetimePrecision::Microsecond));
    }

    #[test]
    fn day_precision_equates_same_day() {
        let a = json!("2026-08-06T01:00:00Z");
        let b = json!("2026-08-06 23:59:59");
        assert!(compare(&a, &b, DatetimePrecision::Day));
        assert!(!compare(&a, &b, DatetimePrecision::Hour));
    }

    #[test]
    fn equal_instants_across_formats() {
        let a = json!("2026-08-06T14:30:00Z");
        let b = json!("2026-08-06 14:30:00");
        assert!(compare(&a, &b, DatetimePrecision::Second));
    }

    #[test]
    fn unparseable_differs() {
        assert!(!compare(
            &json!("not a date"),
            &json!("2026-08-06"),
            DatetimePrecision::Second
        ));
    }

    #[test]
    fn extract_canonicalizes_to_utc_micros() {
        let v = extract(&json!("2026-08-06T14:30:00+02:00")).unwrap();
        assert_eq!(v, json!("2026-08-06T12:30:00.000000Z"));
    }

    #[test]
    fn extract_rejects_non_strings() {
        assert!(extract(&json!(17)).is_none());
    }
}
