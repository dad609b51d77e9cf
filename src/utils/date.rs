//! Date utilities
//!
//! Timestamps are persisted as RFC 3339 UTC text with millisecond precision,
//! so that lexicographic order of the text equals chronological order.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a timestamp as ISO-8601 text
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use flight_checkin::utils::to_iso;
///
/// let date = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
/// assert_eq!(to_iso(&date), "2024-06-01T10:00:00.000Z");
/// ```
pub fn to_iso(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse ISO-8601 text into a UTC timestamp
///
/// Accepts any RFC 3339 timestamp, or a bare `YYYY-MM-DD` date which is read
/// as midnight UTC.
pub fn from_iso(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

/// Whether `value` is a date or timestamp `from_iso` understands
pub fn is_date(value: &str) -> bool {
    from_iso(value).is_some()
}

/// Serde adapter writing timestamps with [`to_iso`] and reading them with [`from_iso`]
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_iso(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::from_iso(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid date: {}", value)))
    }
}
