//! Lenient date and timestamp encodings.
//!
//! Values are always written in ISO 8601 form, but readers accept every
//! shape that has been observed in persisted caches and remote documents:
//!
//! | input                        | `date`            | `lastModified`       |
//! |------------------------------|-------------------|----------------------|
//! | `"2024-03-01"`               | that day          | midnight UTC         |
//! | `"2024-03-01T08:30:00.000Z"` | UTC calendar day  | that instant         |
//! | `1709281800000` (epoch ms)   | UTC calendar day  | that instant         |

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw representation accepted on read.
#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Text(String),
    Millis(i64),
    Float(f64),
}

impl Raw {
    fn into_timestamp(self) -> Option<DateTime<Utc>> {
        match self {
            Raw::Text(text) => parse_timestamp(&text),
            Raw::Millis(ms) => DateTime::<Utc>::from_timestamp_millis(ms),
            Raw::Float(ms) if ms.is_finite() => DateTime::<Utc>::from_timestamp_millis(ms as i64),
            Raw::Float(_) => None,
        }
    }

    fn into_date(self) -> Option<NaiveDate> {
        match self {
            Raw::Text(text) => parse_date(&text),
            other => other.into_timestamp().map(|ts| ts.date_naive()),
        }
    }
}

/// Parses a calendar date from `YYYY-MM-DD` or an RFC 3339 date-time.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| parse_rfc3339(text).map(|ts| ts.date_naive()))
}

/// Parses an instant from RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    parse_rfc3339(text).or_else(|| {
        NaiveDate::parse_from_str(text, DATE_FORMAT)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Formats an instant the way it is persisted (millisecond RFC 3339, `Z`).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Returns the current instant truncated to the persisted precision.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::<Utc>::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Formats a calendar date the way it is persisted.
pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Serde adapter for required calendar dates.
pub mod date {
    use super::*;

    /// Serializes a date as `YYYY-MM-DD`.
    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_date(date))
    }

    /// Deserializes a date from any accepted representation.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        Raw::deserialize(deserializer)?
            .into_date()
            .ok_or_else(|| serde::de::Error::custom("unrecognized date"))
    }
}

/// Serde adapter for optional instants.
pub mod optional {
    use super::*;

    /// Serializes an instant as RFC 3339, or `null`.
    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an instant from any accepted representation or `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => raw
                .into_timestamp()
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom("unrecognized timestamp")),
        }
    }
}
