//! JSON calendar API, queried one month at a time.

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

use crate::core::ExtractError;
use crate::fetch::Fetcher;
use crate::planner::{MonthPlan, REQUEST_DELAY, YearMonth, pause_between};
use crate::slots::dates::{format_time_12h, format_time_range};
use crate::slots::{Candidate, Slot};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Availability payload for one month.
///
/// The remote is loose about types: any field may be null, missing or of
/// the wrong kind. Such fields read as absent, and a record that isn't an
/// object is dropped on its own instead of failing the whole month.
#[derive(Debug, Default, Deserialize)]
pub struct CalendarResponse {
    #[serde(default, deserialize_with = "lenient_records")]
    pub long: Vec<DetailedSlot>,
    #[serde(default, deserialize_with = "lenient")]
    pub next_availability: Option<String>,
    // Spelling is the remote's
    #[serde(default, rename = "no_availability_in_futur", deserialize_with = "lenient")]
    pub no_availability_in_future: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailedSlot {
    #[serde(default, deserialize_with = "lenient")]
    pub slot_start: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub slot_end: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_bookable: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub qty_left: Option<i64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<DetailedSlot>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(records) = lenient::<D, Vec<Value>>(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(records
        .into_iter()
        .filter_map(|record| {
            serde_json::from_value::<DetailedSlot>(record)
                .inspect_err(|e| tracing::warn!("Skipping malformed slot record: {}", e))
                .ok()
        })
        .collect())
}

impl DetailedSlot {
    /// Bookable slots with capacity left, converted to display form.
    /// Timestamps are local to the calendar's configured timezone.
    fn to_slot(&self) -> Option<Slot> {
        let qty_left = self.qty_left.unwrap_or_default();
        if !self.is_bookable.unwrap_or_default() || qty_left <= 0 {
            return None;
        }

        let (Some(raw_start), Some(raw_end)) = (&self.slot_start, &self.slot_end) else {
            tracing::warn!("Skipping slot without start or end time: {:?}", self);
            return None;
        };

        let start = match NaiveDateTime::parse_from_str(raw_start, TIMESTAMP_FORMAT) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Error parsing start time {}: {}", raw_start, e);
                return None;
            }
        };
        let end = match NaiveDateTime::parse_from_str(raw_end, TIMESTAMP_FORMAT) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Error parsing end time {}: {}", raw_end, e);
                return None;
            }
        };

        let time_range = format_time_range(
            &format_time_12h(start.time()),
            &format_time_12h(end.time()),
        );
        let capacity = u32::try_from(qty_left).unwrap_or(u32::MAX);
        Some(Slot::new(start.date(), &time_range, capacity))
    }
}

impl CalendarResponse {
    pub fn parse(body: &str) -> Result<Self, ExtractError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.long
            .iter()
            .filter_map(DetailedSlot::to_slot)
            .collect()
    }

    /// The remote's next open date, if it reported a parseable one.
    pub fn next_available(&self) -> Option<NaiveDate> {
        let raw = self.next_availability.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .inspect_err(|e| tracing::debug!("Ignoring next_availability {:?}: {}", raw, e))
            .ok()
    }

    pub fn no_future_availability(&self) -> bool {
        self.no_availability_in_future.unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct CalendarSource {
    url: String,
    timezone: String,
    variant_id: String,
    delay: Duration,
}

impl CalendarSource {
    pub fn new(url: &str, timezone: &str, variant_id: &str) -> Self {
        Self {
            url: url.to_string(),
            timezone: timezone.to_string(),
            variant_id: variant_id.to_string(),
            delay: REQUEST_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn query(&self, month: YearMonth) -> Vec<(&'static str, String)> {
        vec![
            ("year", month.year.to_string()),
            ("month", month.month.to_string()),
            ("timezone", self.timezone.clone()),
            ("quantity_details[0][type]", String::from("default")),
            ("quantity_details[0][quantity]", String::from("1")),
            ("quantity_details[0][name]", String::from("Default")),
            ("teammate_id", String::from("all")),
            ("duration", String::from("30")),
            ("is_manual", String::from("false")),
            ("variant_id", self.variant_id.clone()),
        ]
    }

    pub async fn fetch_month(
        &self,
        fetcher: &Fetcher,
        month: YearMonth,
    ) -> Result<CalendarResponse, ExtractError> {
        let body = fetcher.get(&self.url, &self.query(month)).await?;
        CalendarResponse::parse(&body)
    }

    /// Walk the months of the lookahead window, stopping as soon as the
    /// remote says nothing opens before the window ends. A month that fails
    /// to fetch or parse is logged and skipped.
    pub async fn collect(
        &self,
        fetcher: &Fetcher,
        today: NaiveDate,
        months_ahead: u32,
    ) -> Result<Vec<Candidate>, ExtractError> {
        let plan = MonthPlan::new(today, months_ahead);
        let months = plan.months();
        let mut candidates = Vec::new();

        for (i, month) in months.iter().enumerate() {
            tracing::info!("Checking availability for {}", month);

            let response = match self.fetch_month(fetcher, *month).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("Error fetching availability for {}: {}", month, e);
                    pause_between(i, months.len(), self.delay).await;
                    continue;
                }
            };

            if let Some(next) = response.next_available()
                && plan.is_beyond_window(next)
            {
                tracing::info!(
                    "Next availability {} is beyond threshold {}, stopping search",
                    next,
                    plan.threshold()
                );
                break;
            }

            let slots = response.slots();
            if slots.is_empty() {
                tracing::info!("No appointments available for {}", month);
                if let Some(next) = response.next_available() {
                    tracing::info!("Next availability: {}", next);
                }
            } else {
                tracing::info!("Found {} appointment slots for {}", slots.len(), month);
                candidates.extend(slots.into_iter().map(Candidate::from));
            }

            if response.no_future_availability() {
                tracing::info!("Calendar reports no future availability, stopping search");
                break;
            }

            pause_between(i, months.len(), self.delay).await;
        }

        tracing::info!("Total available appointments found: {}", candidates.len());
        Ok(candidates)
    }
}
