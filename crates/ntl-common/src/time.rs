//! Time handling utilities for scene acquisition dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Compact date format used in composite labels and output file names.
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Parse a `YYYY-MM-DD` day string.
pub fn parse_day(s: &str) -> Result<NaiveDate, TimeParseError> {
    let parts: Vec<&str> = s.trim().split('-').collect();
    if parts.len() != 3 {
        return Err(TimeParseError::InvalidFormat(s.to_string()));
    }

    let year: i32 = parts[0]
        .parse()
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))?;
    let month: u32 = parts[1]
        .parse()
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))?;
    let day: u32 = parts[2]
        .parse()
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| TimeParseError::OutOfRange(s.to_string()))
}

/// Parse a catalog date column: `YYYY/MM/DD` or `YYYY-MM-DD`.
pub fn parse_catalog_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    let trimmed = s.trim();
    NaiveDate::parse_from_str(trimmed, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}

/// Parse an acquisition timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, or a bare
/// date (midnight UTC).
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    let midnight = parse_catalog_date(trimmed)?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| TimeParseError::OutOfRange(s.to_string()))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// Format a timestamp as a compact `YYYYMMDD` string.
pub fn compact_date(dt: &DateTime<Utc>) -> String {
    dt.format(COMPACT_DATE_FORMAT).to_string()
}

/// A sliding selection window over acquisition timestamps.
///
/// Selection is exclusive at both ends: a timestamp equal to `start` or
/// `end` is not inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window starting at `start` spanning `width_days`.
    ///
    /// Returns `None` when the end is not a representable timestamp.
    pub fn starting_at(start: DateTime<Utc>, width_days: i64) -> Option<Self> {
        let end = start.checked_add_signed(TimeDelta::try_days(width_days)?)?;
        Some(Self { start, end })
    }

    /// True if `start < dt < end`.
    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        &self.start < dt && dt < &self.end
    }

    /// Shift the window forward by `stride_days`, keeping its width.
    ///
    /// Returns `None` once the shifted window leaves the representable range.
    pub fn advance(&self, stride_days: i64) -> Option<Self> {
        let width = self.end - self.start;
        let start = self
            .start
            .checked_add_signed(TimeDelta::try_days(stride_days)?)?;
        Some(Self {
            start,
            end: start.checked_add_signed(width)?,
        })
    }

    /// Label `YYYYMMDD_YYYYMMDD`.
    pub fn label(&self) -> String {
        format!("{}_{}", compact_date(&self.start), compact_date(&self.end))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Date out of range: {0}")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_day() {
        let d = parse_day("2014-03-07").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2014, 3, 7));
        assert!(parse_day("2014-13-07").is_err());
        assert!(parse_day("20140307").is_err());
    }

    #[test]
    fn test_parse_catalog_date_both_separators() {
        assert_eq!(
            parse_catalog_date("2014/03/07").unwrap(),
            parse_catalog_date("2014-03-07").unwrap()
        );
    }

    #[test]
    fn test_parse_datetime_space_separated() {
        let dt = parse_datetime("2014-03-07 10:24:19").unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 24);
        assert_eq!(dt.second(), 19);
    }

    #[test]
    fn test_window_exclusive_bounds_and_label() {
        let start = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::starting_at(start, 28).unwrap();

        assert!(!window.contains(&start));
        assert!(window.contains(&(start + TimeDelta::days(1))));
        assert!(!window.contains(&window.end));
        assert_eq!(window.label(), "20140101_20140129");

        let next = window.advance(7).unwrap();
        assert_eq!(next.start, start + TimeDelta::days(7));
        assert_eq!(next.end, start + TimeDelta::days(35));
    }

    #[test]
    fn test_window_past_representable_range() {
        let start = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
        assert!(TimeWindow::starting_at(start, 100_000_000).is_none());
        assert!(TimeWindow::starting_at(start, i64::MAX).is_none());

        let window = TimeWindow::starting_at(start, 28).unwrap();
        assert!(window.advance(100_000_000).is_none());
        assert!(window.advance(i64::MAX).is_none());
    }
}
