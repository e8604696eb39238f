//! Calendar helpers for daily series

use crate::error::{HtsError, Result};
use chrono::{Datelike, Duration, NaiveDate};

/// Date formats accepted for raw sales dates, tried in order
pub const DATE_FORMATS: [&str; 2] = ["%d.%m.%Y", "%Y-%m-%d"];

/// Format used for `ds` in every file this crate writes
pub const DS_FORMAT: &str = "%Y-%m-%d";

/// Parse a date in any of the accepted formats
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| HtsError::DataError(format!("Unparseable date: '{}'", raw)))
}

/// Every day from `start` to `end`, both inclusive
pub fn daily_calendar(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// The `horizon` days following `last`
pub fn future_dates(last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as i64).map(|offset| last + Duration::days(offset)).collect()
}

/// Whether `dates` is a gap-free ascending daily sequence
pub fn is_contiguous(dates: &[NaiveDate]) -> bool {
    dates
        .windows(2)
        .all(|pair| pair[1] - pair[0] == Duration::days(1))
}

/// Months elapsed since year 0, used to derive monthly period blocks
pub fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}
