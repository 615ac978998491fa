//! Calendar helpers for normalizing the partial dates that booking pages
//! show (month names without years, bare day numbers, 24-hour timestamps).

use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime};

use crate::core::DateError;

pub const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Resolve a full month name to its number (1-12).
///
/// Matching is case-insensitive and ignores surrounding whitespace. When
/// the whole string is not a month name, the first word (with trailing
/// `,.;:` removed) is tried once, so `"May, 2025"` resolves to 5.
/// Abbreviations are not recognized.
pub fn month_from_name(name: &str) -> Result<u32, DateError> {
    lookup_month(name, true).ok_or_else(|| DateError::UnknownMonth(name.to_string()))
}

fn lookup_month(name: &str, retry: bool) -> Option<u32> {
    let cleaned = name.trim().to_lowercase();
    if let Some(idx) = MONTH_NAMES.iter().position(|m| *m == cleaned) {
        return Some(idx as u32 + 1);
    }
    if !retry {
        return None;
    }

    let first = cleaned
        .split_whitespace()
        .next()?
        .trim_end_matches([',', '.', ';', ':']);
    if first == cleaned {
        return None;
    }
    lookup_month(first, false)
}

/// Pick the year for a month label that may or may not carry one.
///
/// An explicit trailing year within `[this year, this year + 5)` wins.
/// Otherwise a month earlier than the current one is taken to be next
/// year's.
pub fn infer_year(month_label: &str, month: u32, today: NaiveDate) -> i32 {
    let current_year = today.year();

    let explicit = month_label
        .split_whitespace()
        .skip(1)
        .last()
        .and_then(|last| last.parse::<i32>().ok())
        .filter(|y| (current_year..current_year + 5).contains(y));

    match explicit {
        Some(year) => year,
        None if month < today.month() => current_year + 1,
        None => current_year,
    }
}

/// Turn a month label and a day-of-month string into a calendar date.
pub fn resolve_date(month_label: &str, day: &str, today: NaiveDate) -> Result<NaiveDate, DateError> {
    let month = month_from_name(month_label)?;
    let invalid_day = || DateError::InvalidDay {
        month: month_label.to_string(),
        day: day.to_string(),
    };

    let day_num: u32 = day.trim().parse().map_err(|_| invalid_day())?;
    let year = infer_year(month_label, month, today);
    NaiveDate::from_ymd_opt(year, month, day_num).ok_or_else(invalid_day)
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// `date` plus `n` calendar months, clamped to the end of the target month.
pub fn add_months(date: NaiveDate, n: u32) -> NaiveDate {
    date.checked_add_months(Months::new(n))
        .unwrap_or(NaiveDate::MAX)
}

/// Render a time as `"3:04 pm"`.
pub fn format_time_12h(time: NaiveTime) -> String {
    time.format("%-I:%M %P").to_string()
}

/// Render a display range as `"10:00 am – 11:00 am"`.
pub fn format_time_range(start: &str, end: &str) -> String {
    format!("{} – {}", start, end)
}
