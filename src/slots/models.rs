use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::dates::resolve_date;
use crate::core::DateError;

/// One unit of bookable availability.
///
/// Two slots are the same slot when their date and time range match;
/// `capacity` and `available` are ignored for identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    // Field names match the seen-data files written by earlier releases
    #[serde(rename = "time", default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(rename = "spaces", default)]
    pub capacity: u32,
    #[serde(rename = "isAvailable", default)]
    pub available: bool,
}

/// Identity of a slot for novelty checks.
pub type SlotKey = (NaiveDate, Option<String>);

impl Slot {
    pub fn new(date: NaiveDate, time_range: &str, capacity: u32) -> Self {
        Self {
            date,
            time_range: Some(time_range.to_string()),
            capacity,
            available: capacity > 0,
        }
    }

    /// A whole-day slot from a source that only reports day-level
    /// availability.
    pub fn day(date: NaiveDate, available: bool) -> Self {
        Self {
            date,
            time_range: None,
            capacity: u32::from(available),
            available,
        }
    }

    pub fn key(&self) -> SlotKey {
        (self.date, self.time_range.clone())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        // Day-level sources only say a day is open, not how many spaces
        match &self.time_range {
            Some(time_range) => {
                write!(f, " at {} ({} spaces available)", time_range, self.capacity)
            }
            None => Ok(()),
        }
    }
}

/// A calendar cell scraped from a page that only shows the day number and
/// a month heading. The year has to be inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub month_label: String,
    pub day: String,
    pub available: bool,
}

impl DayCell {
    pub fn resolve(&self, today: NaiveDate) -> Result<Slot, DateError> {
        let date = resolve_date(&self.month_label, &self.day, today)?;
        Ok(Slot::day(date, self.available))
    }
}

/// What an extractor hands to the novelty filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Slot(Slot),
    Day(DayCell),
}

impl Candidate {
    pub fn is_available(&self) -> bool {
        match self {
            Candidate::Slot(slot) => slot.available,
            Candidate::Day(cell) => cell.available,
        }
    }

    pub fn resolve(&self, today: NaiveDate) -> Result<Slot, DateError> {
        match self {
            Candidate::Slot(slot) => Ok(slot.clone()),
            Candidate::Day(cell) => cell.resolve(today),
        }
    }
}

impl From<Slot> for Candidate {
    fn from(slot: Slot) -> Self {
        Candidate::Slot(slot)
    }
}

impl From<DayCell> for Candidate {
    fn from(cell: DayCell) -> Self {
        Candidate::Day(cell)
    }
}
