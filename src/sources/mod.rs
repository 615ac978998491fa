//! Slot sources. Each deployment polls exactly one kind of remote, chosen
//! at startup; all of them produce the same `Candidate` list.

pub mod calendar;
pub mod scrape;
pub mod token;

use chrono::NaiveDate;

use crate::core::{AppConfig, ExtractError, SourceKind};
use crate::fetch::Fetcher;
use crate::slots::Candidate;

pub use calendar::CalendarSource;
pub use scrape::ScrapeSource;
pub use token::{RetryPolicy, TokenSource};

#[derive(Debug, Clone)]
pub enum SlotSource {
    Token(TokenSource),
    Calendar(CalendarSource),
    Scrape(ScrapeSource),
}

impl SlotSource {
    pub fn from_config(config: &AppConfig) -> Self {
        match config.source {
            SourceKind::Token => SlotSource::Token(TokenSource::new(
                &config.booking_url,
                &config.ajax_url,
                &config.ajax_action,
                &config.calendar_id,
            )),
            SourceKind::Calendar => SlotSource::Calendar(CalendarSource::new(
                &config.calendar_api_url,
                &config.timezone,
                &config.variant_id,
            )),
            SourceKind::Scrape => SlotSource::Scrape(ScrapeSource::new(&config.booking_url)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SlotSource::Token(_) => "token",
            SlotSource::Calendar(_) => "calendar",
            SlotSource::Scrape(_) => "scrape",
        }
    }

    /// Gather candidates for the lookahead window. An error here means the
    /// source could not produce anything at all; failures limited to a
    /// single day or month are logged by the source and skipped.
    pub async fn collect(
        &self,
        fetcher: &Fetcher,
        today: NaiveDate,
        months_ahead: u32,
    ) -> Result<Vec<Candidate>, ExtractError> {
        match self {
            SlotSource::Token(source) => source.collect(fetcher, today, months_ahead).await,
            SlotSource::Calendar(source) => source.collect(fetcher, today, months_ahead).await,
            SlotSource::Scrape(source) => source.collect(fetcher, today, months_ahead).await,
        }
    }
}
