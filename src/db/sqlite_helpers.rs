//! SQLite helper utilities for type conversion
//!
//! SQLite has no native timestamp type. Timestamps are stored as RFC 3339 TEXT
//! so they sort lexically and survive a round trip with full precision.

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp as ISO8601 string for SQLite
#[inline]
pub fn now_iso8601() -> String {
    datetime_to_str(Utc::now())
}

/// Convert a chrono DateTime to ISO8601 string
///
/// Always emits nanoseconds so that values written at different times compare
/// correctly as plain strings (`ORDER BY discovered_at`).
#[inline]
pub fn datetime_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse an ISO8601 string to DateTime
#[inline]
pub fn str_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Rows touched by hand through `sql` use SQLite's datetime() format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
                .map_err(|e| anyhow!("Invalid datetime '{}': {}", s, e))
        })
}

/// Parse an optional datetime string
#[inline]
pub fn str_to_datetime_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match s {
        Some(s) if !s.is_empty() => Ok(Some(str_to_datetime(s)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_datetime_roundtrip_keeps_nanos() {
        let dt = Utc
            .with_ymd_and_hms(2021, 3, 14, 15, 9, 26)
            .unwrap()
            .with_nanosecond(535_897_932)
            .unwrap();
        let parsed = str_to_datetime(&datetime_to_str(dt)).unwrap();
        assert_eq!(dt, parsed);
    }

    #[test]
    fn test_sqlite_datetime_format() {
        let parsed = str_to_datetime("2024-01-15 10:30:00").unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.hour(), 10);
    }

    #[test]
    fn test_optional_empty_is_none() {
        assert!(str_to_datetime_opt(None).unwrap().is_none());
        assert!(str_to_datetime_opt(Some("")).unwrap().is_none());
        assert!(str_to_datetime_opt(Some("garbage")).is_err());
    }

    #[test]
    fn test_fixed_width_strings_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(datetime_to_str(early) < datetime_to_str(late));
    }
}
