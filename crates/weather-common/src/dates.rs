//! Calendar date handling for historical queries.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{WeatherError, WeatherResult};

/// Earliest date historical data is served for.
pub const HISTORICAL_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1979, 1, 2) {
    Some(d) => d,
    None => panic!("invalid epoch"),
};

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(param: &str, s: &str) -> WeatherResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        WeatherError::invalid(param, format!("'{}' is not a YYYY-MM-DD date", s))
    })
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> WeatherResult<Self> {
        if start > end {
            return Err(WeatherError::invalid(
                "start_date",
                format!("start date {} is after end date {}", start, end),
            ));
        }
        Ok(Self { start, end })
    }

    /// Range covering `days_back` days before `end`, plus `end` itself.
    pub fn lookback(end: NaiveDate, days_back: u32) -> Self {
        Self {
            start: end - Duration::days(days_back as i64),
            end,
        }
    }

    /// Number of days in the range, both ends included.
    pub fn days(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Ascending iterator over every day in the range.
    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}
