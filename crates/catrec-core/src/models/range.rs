use std::iter::FusedIterator;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CatrecError;

/// Inclusive, day-granular date interval. Always satisfies `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CatrecError> {
        if start > end {
            return Err(CatrecError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The last `days` days ending at (and including) `today`.
    pub fn days_back(today: NaiveDate, days: u32) -> Result<Self, CatrecError> {
        if days == 0 {
            return Err(CatrecError::Config {
                message: "days back must be at least 1".into(),
            });
        }
        let start = today
            .checked_sub_signed(Duration::days(i64::from(days) - 1))
            .ok_or_else(|| CatrecError::Config {
                message: format!("{days} days back from {today} is out of range"),
            })?;
        Ok(Self { start, end: today })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Split into contiguous chunks of the given granularity.
    pub fn chunks(&self, granularity: Granularity) -> Chunks {
        Chunks {
            next_start: Some(self.start),
            end: self.end,
            granularity,
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..{}", self.start, self.end)
        }
    }
}

/// Size of the sub-intervals a query range is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Month,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Month => write!(f, "month"),
        }
    }
}

/// Lazy chunk sequence over a [`DateRange`]. Clone it to restart.
#[derive(Debug, Clone)]
pub struct Chunks {
    next_start: Option<NaiveDate>,
    end: NaiveDate,
    granularity: Granularity,
}

impl Iterator for Chunks {
    type Item = DateRange;

    fn next(&mut self) -> Option<DateRange> {
        let start = self.next_start?;
        let natural_end = match self.granularity {
            Granularity::Day => start,
            Granularity::Month => month_end(start),
        };
        let end = natural_end.min(self.end);
        self.next_start = end.succ_opt().filter(|d| *d <= self.end);
        Some(DateRange { start, end })
    }
}

impl FusedIterator for Chunks {}

/// Last day of the calendar month containing `day`.
fn month_end(day: NaiveDate) -> NaiveDate {
    day.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next_first| next_first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}
