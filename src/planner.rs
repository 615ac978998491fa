//! Enumerates the remote queries needed to cover a lookahead window.
//!
//! Date-indexed sources are queried once per day, month-indexed sources
//! once per calendar month.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::time::Duration;

use crate::slots::dates::{add_months, first_of_month};

/// Pause between consecutive requests to the same remote.
pub const REQUEST_DELAY: Duration = Duration::from_millis(100);

/// Per-day planning treats every month as 30 days long. Downstream
/// consumers rely on the resulting list length, so this is not calendar
/// accurate on purpose.
pub const DAYS_PER_MONTH: u32 = 30;

pub fn days_for_months(months_ahead: u32) -> u32 {
    months_ahead.saturating_mul(DAYS_PER_MONTH)
}

/// `days` consecutive dates beginning with `start`.
pub fn day_range(start: NaiveDate, days: u32) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take(days as usize)
        .collect()
}

/// `YYYY-MM-DD`, the format date-indexed endpoints expect.
pub fn format_day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Months to query for a month-indexed source, plus the cutoff used to stop
/// early once the remote reports that nothing opens before it.
#[derive(Debug, Clone)]
pub struct MonthPlan {
    months: Vec<YearMonth>,
    threshold: NaiveDate,
}

impl MonthPlan {
    pub fn new(today: NaiveDate, months_ahead: u32) -> Self {
        let start = first_of_month(today);
        let months = (0..months_ahead)
            .map(|i| YearMonth::from(add_months(start, i)))
            .collect();

        Self {
            months,
            threshold: add_months(today, months_ahead),
        }
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn threshold(&self) -> NaiveDate {
        self.threshold
    }

    /// True when the remote's next open date lies past the window, meaning
    /// the remaining months can be skipped.
    pub fn is_beyond_window(&self, next_available: NaiveDate) -> bool {
        next_available > self.threshold
    }
}

/// Sleep between requests, but not after the last one.
pub async fn pause_between(index: usize, total: usize, delay: Duration) {
    if index + 1 < total && !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
