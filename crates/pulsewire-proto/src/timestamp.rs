//! ISO-8601 timestamps as sent on the wire.
//!
//! Outbound timestamps are UTC with millisecond precision and a `Z` suffix
//! (`2026-01-01T00:00:00.000Z`), the format browsers produce. Inbound
//! timestamps are parsed leniently: any RFC 3339 offset, offset-less ISO-8601
//! (read as UTC) or epoch milliseconds. Anything else decodes as `None` so a
//! bad timestamp never costs the frame.

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Format a timestamp for the wire.
pub fn format(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter for [`format`].
pub fn serialize<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(at))
}

/// Read an inbound timestamp, or `None` if it is not one.
///
/// Results outside years 0 to 9999 are rejected since they do not survive
/// re-encoding.
pub fn parse_lenient(value: &Value) -> Option<DateTime<Utc>> {
    let at = match value {
        Value::String(text) => text.parse::<DateTime<Utc>>().ok().or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok().map(|at| at.and_utc())
        }),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }?;
    (0..=9999).contains(&at.year()).then_some(at)
}

/// Serde adapter for [`parse_lenient`].
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_lenient(&Value::deserialize(deserializer)?))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn half_past_nine() -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).single()
    }

    #[test]
    fn formats_with_millis_and_zulu_suffix() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).single().unwrap();
        assert_eq!(format(&at), "2026-10-16T09:30:00.000Z");
    }

    #[test]
    fn parses_offsets_and_offset_less_text() {
        assert_eq!(parse_lenient(&json!("2026-10-16T09:30:00.000Z")), half_past_nine());
        assert_eq!(parse_lenient(&json!("2026-10-16T11:30:00+02:00")), half_past_nine());
        assert_eq!(parse_lenient(&json!("2026-10-16T09:30:00")), half_past_nine());
    }

    #[test]
    fn parses_epoch_milliseconds() {
        assert_eq!(parse_lenient(&json!(1_792_143_000_000_i64)), half_past_nine());
    }

    #[test]
    fn unreadable_values_are_none() {
        for value in [json!("yesterday"), json!(true), json!({}), json!(1.5), Value::Null] {
            assert_eq!(parse_lenient(&value), None, "{value}");
        }
        assert_eq!(parse_lenient(&json!(i64::MAX)), None);
    }
}
