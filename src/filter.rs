//! Decides which freshly extracted candidates are worth reporting.

use chrono::NaiveDate;

use crate::slots::dates::{add_months, first_of_month};
use crate::slots::{Candidate, Slot};
use crate::store::SeenSet;

/// Dates from `today` up to, but not including, the first day of the month
/// after the lookahead window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn lookahead(today: NaiveDate, months_ahead: u32) -> Self {
        Self {
            start: today,
            end: add_months(first_of_month(today), months_ahead.saturating_add(1)),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Return the candidates that are available, not in `seen` and inside the
/// lookahead window, in their original order.
///
/// Day-level candidates are resolved to a calendar date first; one that
/// can't be resolved is logged and dropped.
pub fn filter_new(
    candidates: &[Candidate],
    seen: &SeenSet,
    months_ahead: u32,
    today: NaiveDate,
) -> Vec<Slot> {
    let window = Window::lookahead(today, months_ahead);
    let mut fresh = Vec::new();

    for candidate in candidates {
        if !candidate.is_available() {
            continue;
        }

        let slot = match candidate.resolve(today) {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!("Skipping candidate {:?}: {}", candidate, e);
                continue;
            }
        };

        if seen.contains(&slot) {
            continue;
        }
        if !window.contains(slot.date) {
            tracing::debug!("Slot {} is outside {} - {}", slot, window.start, window.end);
            continue;
        }

        fresh.push(slot);
    }

    tracing::info!(
        "Filtered {} new appointments from {} total",
        fresh.len(),
        candidates.len()
    );
    fresh
}
