//! Timestamp and date encoding for TEXT columns.
//!
//! Timestamps are RFC 3339 in UTC with fixed microsecond precision, so
//! lexical order in SQL equals chronological order.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(column: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2025, 9, 5, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        assert!(format_ts(&early) < format_ts(&late));
        assert_eq!(format_ts(&early), "2025-09-05T09:00:00.000000Z");
    }

    #[test]
    fn test_parse_ts_round_trip_and_error() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_ts(0, &format_ts(&ts)).unwrap(), ts);
        assert!(parse_ts(3, "yesterday").is_err());
    }

    #[test]
    fn test_date_format() {
        let d = NaiveDate::from_ymd_opt(2025, 9, 5).unwrap();
        assert_eq!(format_date(d), "2025-09-05");
        assert_eq!(parse_date(0, "2025-09-05").unwrap(), d);
    }
}
