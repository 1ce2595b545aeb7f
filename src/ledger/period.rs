//! Aggregation periods
//!
//! A period is a half-open `[start, end)` window in UTC. Calendar helpers
//! take a cutover offset in whole hours so a business day can start at,
//! say, 04:00 UTC instead of midnight.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors constructing or parsing periods
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("Period start {start} is not before end {end}")]
    Empty { start: String, end: String },

    #[error("Cutover offset {0}h is outside -23..=23")]
    InvalidOffset(i32),

    #[error("Invalid period '{0}'")]
    Invalid(String),

    #[error("Periods overlap: {0} and {1}")]
    Overlapping(String, String),
}

/// A half-open aggregation window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, PeriodError> {
        if start >= end {
            return Err(PeriodError::Empty {
                start: format_ts(&start),
                end: format_ts(&end),
            });
        }
        Ok(Self { start, end })
    }

    /// One calendar day starting at `offset_hours` past UTC midnight
    pub fn day(date: NaiveDate, offset_hours: i32) -> Result<Self, PeriodError> {
        let start = day_start(date, offset_hours)?;
        let end = start
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| PeriodError::Invalid(date.to_string()))?;
        Self::new(start, end)
    }

    /// One calendar month with the same cutover as [`Period::day`]
    pub fn month(year: i32, month: u32, offset_hours: i32) -> Result<Self, PeriodError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| PeriodError::Invalid(format!("{:04}-{:02}", year, month)))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| PeriodError::Invalid(format!("{:04}-{:02}", year, month)))?;
        Self::new(day_start(first, offset_hours)?, day_start(next, offset_hours)?)
    }

    /// Consecutive single-day periods for `from..=to`
    pub fn daily_range(
        from: NaiveDate,
        to: NaiveDate,
        offset_hours: i32,
    ) -> Result<Vec<Self>, PeriodError> {
        if from > to {
            return Err(PeriodError::Invalid(format!("{} after {}", from, to)));
        }
        from.iter_days()
            .take_while(|d| *d <= to)
            .map(|d| Self::day(d, offset_hours))
            .collect()
    }

    /// Parse `YYYY-MM` (month) or `YYYY-MM-DD` (day)
    pub fn parse_calendar(s: &str, offset_hours: i32) -> Result<Self, PeriodError> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Self::day(date, offset_hours);
        }
        let with_day = format!("{}-01", s);
        match NaiveDate::parse_from_str(&with_day, "%Y-%m-%d") {
            Ok(date) => Self::month(date.year(), date.month(), offset_hours),
            Err(_) => Err(PeriodError::Invalid(s.to_string())),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start <= *ts && *ts < self.end
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Stable text key, `<start>/<end>` in RFC 3339 UTC
    pub fn key(&self) -> String {
        format!("{}/{}", format_ts(&self.start), format_ts(&self.end))
    }

    /// Sort and reject overlapping windows
    pub fn sorted_disjoint(mut periods: Vec<Period>) -> Result<Vec<Period>, PeriodError> {
        periods.sort();
        periods.dedup();
        for pair in periods.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                return Err(PeriodError::Overlapping(pair[0].key(), pair[1].key()));
            }
        }
        Ok(periods)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    /// Parse the `<start>/<end>` form produced by [`Period::key`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('/')
            .ok_or_else(|| PeriodError::Invalid(s.to_string()))?;
        let parse = |v: &str| {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| PeriodError::Invalid(s.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }
}

fn day_start(date: NaiveDate, offset_hours: i32) -> Result<DateTime<Utc>, PeriodError> {
    if !(-23..=23).contains(&offset_hours) {
        return Err(PeriodError::InvalidOffset(offset_hours));
    }
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| PeriodError::Invalid(date.to_string()))?;
    Utc.from_utc_datetime(&midnight)
        .checked_add_signed(Duration::hours(offset_hours as i64))
        .ok_or_else(|| PeriodError::Invalid(date.to_string()))
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_half_open() {
        let p = Period::day(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(), 0).unwrap();
        assert!(p.contains(&ts("2026-09-01T00:00:00Z")));
        assert!(p.contains(&ts("2026-09-01T23:59:59Z")));
        assert!(!p.contains(&ts("2026-09-02T00:00:00Z")));
        assert!(!p.contains(&ts("2026-08-31T23:59:59Z")));
    }

    #[test]
    fn test_cutover_offset() {
        let p = Period::day(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(), 4).unwrap();
        assert_eq!(p.key(), "2026-09-01T04:00:00Z/2026-09-02T04:00:00Z");
        assert!(!p.contains(&ts("2026-09-01T03:59:59Z")));
    }

    #[test]
    fn test_invalid_offset() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        assert_eq!(Period::day(date, 24), Err(PeriodError::InvalidOffset(24)));
    }

    #[test]
    fn test_month_wraps_year() {
        let p = Period::month(2026, 12, 0).unwrap();
        assert_eq!(p.key(), "2026-12-01T00:00:00Z/2027-01-01T00:00:00Z");
    }

    #[test]
    fn test_parse_calendar() {
        let month = Period::parse_calendar("2026-02", 0).unwrap();
        assert_eq!(month.key(), "2026-02-01T00:00:00Z/2026-03-01T00:00:00Z");
        let day = Period::parse_calendar("2026-02-28", 0).unwrap();
        assert_eq!(day.key(), "2026-02-28T00:00:00Z/2026-03-01T00:00:00Z");
        assert!(Period::parse_calendar("last tuesday", 0).is_err());
    }

    #[test]
    fn test_key_round_trip() {
        let p = Period::month(2026, 9, -3).unwrap();
        assert_eq!(p.key().parse::<Period>().unwrap(), p);
    }

    #[test]
    fn test_empty_period_rejected() {
        let t = ts("2026-09-01T00:00:00Z");
        assert!(matches!(Period::new(t, t), Err(PeriodError::Empty { .. })));
    }

    #[test]
    fn test_daily_range_inclusive() {
        let from = NaiveDate::from_ymd_opt(2026, 9, 29).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 10, 2).unwrap();
        let days = Period::daily_range(from, to, 0).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0].end(), days[1].start());
    }

    #[test]
    fn test_calendar_edge_is_invalid() {
        assert!(matches!(
            Period::day(NaiveDate::MAX, 0),
            Err(PeriodError::Invalid(_))
        ));
        assert!(matches!(
            Period::day(NaiveDate::MIN, -1),
            Err(PeriodError::Invalid(_))
        ));
        let before_max = NaiveDate::MAX.pred_opt().unwrap();
        assert!(Period::daily_range(before_max, NaiveDate::MAX, 0).is_err());
        assert!(Period::day(before_max, 0).is_ok());
        assert!(matches!(
            Period::month(NaiveDate::MAX.year(), 12, 0),
            Err(PeriodError::Invalid(_))
        ));
    }

    #[test]
    fn test_sorted_disjoint_rejects_overlap() {
        let month = Period::month(2026, 9, 0).unwrap();
        let day = Period::day(NaiveDate::from_ymd_opt(2026, 9, 3).unwrap(), 0).unwrap();
        assert!(matches!(
            Period::sorted_disjoint(vec![month, day]),
            Err(PeriodError::Overlapping(..))
        ));
        let oct = Period::month(2026, 10, 0).unwrap();
        let sorted = Period::sorted_disjoint(vec![oct, month, oct]).unwrap();
        assert_eq!(sorted, vec![month, oct]);
    }
}
