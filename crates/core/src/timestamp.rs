//! Lenient timestamp parsing shared by expiry derivation and clock sync
//!
//! Backends hand out timestamps in several shapes: RFC 3339, naive date-times
//! with a space or `T` separator, bare dates, and occasionally epoch numbers.
//! Nothing here returns an error: an unparseable value is simply `None` so
//! callers can fall through to their next strategy.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date-times carrying an explicit offset that RFC 3339 parsing rejects
/// (space separator, `+0000` style offsets).
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Naive date-times, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Epoch values at or above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// A timestamp as it appears on the wire: text or an epoch number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(i64),
    Text(String),
}

impl RawTimestamp {
    /// Resolves to an absolute instant, or `None` when malformed.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Text(s) => parse_lenient(s),
            RawTimestamp::Epoch(n) if n.abs() >= EPOCH_MILLIS_THRESHOLD => {
                Utc.timestamp_millis_opt(*n).single()
            }
            RawTimestamp::Epoch(n) => Utc.timestamp_opt(*n, 0).single(),
        }
    }
}

impl From<&str> for RawTimestamp {
    fn from(s: &str) -> Self {
        RawTimestamp::Text(s.to_string())
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        RawTimestamp::Text(dt.to_rfc3339())
    }
}

impl fmt::Display for RawTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTimestamp::Epoch(n) => write!(f, "{}", n),
            RawTimestamp::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parses a timestamp leniently.
///
/// - RFC 3339 and offset-bearing date-times are converted to UTC
/// - `YYYY-MM-DD HH:MM[:SS[.fff]]` and the `T`-separated form are taken as UTC,
///   as is a trailing `Z` on either
/// - a bare `YYYY-MM-DD` resolves to the end of that day (23:59:59 UTC)
pub fn parse_lenient(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(end_of_day)
}

/// 23:59:59 UTC on the given date.
pub fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 59)
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}
