//! Timestamp serialization boundary
//!
//! Records hold `DateTime<FixedOffset>`; storage and events hold ISO-8601
//! strings. All conversions between the two go through this module.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, SubsecRound, Utc};

/// Current time in UTC, truncated to microseconds
pub fn now() -> DateTime<FixedOffset> {
    Utc::now().trunc_subsecs(6).fixed_offset()
}

/// Convert a timestamp to its stored ISO-8601 form, e.g.
/// `2024-05-01T12:30:00.123456+00:00`
pub fn normalize(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339 (with `T` or space separator) and naive date-times,
/// which are taken as UTC.
pub fn parse(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts);
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Serde adapter for `Option<DateTime<FixedOffset>>` fields
pub mod option {
    use chrono::{DateTime, FixedOffset};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_some(&super::normalize(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            super::parse(&s).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", s)))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_normalize_uses_offset_form() {
        let ts = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .unwrap()
            .fixed_offset();
        assert_eq!(normalize(&ts), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_keeps_offset() {
        let ts = parse("2024-05-01T14:30:00+02:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(normalize(&ts), "2024-05-01T14:30:00+02:00");
    }

    #[test]
    fn test_parse_naive_is_utc() {
        let ts = parse("2024-05-01 12:30:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!(ts.hour(), 12);

        assert!(parse("2024-05-01T12:30").is_some());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("yesterday").is_none());
        assert!(parse("").is_none());
        assert!(parse("2024-13-01T00:00:00Z").is_none());
    }

    #[test]
    fn test_now_roundtrips_through_string() {
        let ts = now();
        assert_eq!(parse(&normalize(&ts)), Some(ts));
        assert_eq!(ts.nanosecond() % 1_000, 0);
    }
}
