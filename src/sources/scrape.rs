//! Best-effort scrape of a rendered booking calendar.
//!
//! The page has no stable markup, so the month comes from whatever heading
//! mentions a year, and days are any small numbers found in the content
//! area. Each day is reported as a whole-day candidate; the year is only
//! settled later when the candidate is resolved against today's date.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::core::ExtractError;
use crate::fetch::Fetcher;
use crate::slots::{Candidate, DayCell};

/// Month label used when the page gives no usable month context.
pub const UNKNOWN_MONTH: &str = "Unknown Month";

const AVAILABLE_CLASSES: [&str; 2] = ["available", "active"];
const UNAVAILABLE_CLASSES: [&str; 7] = [
    "booked",
    "unavailable",
    "disabled",
    "past-day",
    "grey",
    "gray",
    "red",
];

static HEADINGS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, .entry-title, .page-title").expect("Invalid selector")
});
static PARAGRAPHS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("Invalid selector"));
static CONTENT_REGIONS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".entry-content, article, .post-content, .page-content")
        .expect("Invalid selector")
});
static DAY_CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, div").expect("Invalid selector"));
static LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("Invalid selector"));

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}\b").expect("Invalid regex"));
static MONTH_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\b[\s,]*(\d{4}\b)?",
    )
    .expect("Invalid regex")
});

fn element_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Narrow a heading or paragraph down to `"<Month> <Year>"` when it contains
/// one, otherwise keep the text after a trailing `" for "`.
fn month_label(text: &str) -> String {
    // "may" is also an ordinary word, so a month followed by a year wins
    let phrases: Vec<_> = MONTH_PHRASE.captures_iter(text).collect();
    let best = phrases
        .iter()
        .find(|caps| caps.get(2).is_some())
        .or(phrases.first());
    if let Some(caps) = best {
        return match caps.get(2) {
            Some(year) => format!("{} {}", &caps[1], year.as_str()),
            None => caps[1].to_string(),
        };
    }
    match text.rsplit_once(" for ") {
        Some((_, tail)) => tail.trim().to_string(),
        None => text.to_string(),
    }
}

/// Find the month the calendar is showing: the first heading with a year,
/// else the first paragraph naming both a month and a year.
pub fn find_month_context(doc: &Html) -> Option<String> {
    let from_heading = doc
        .select(&HEADINGS)
        .map(element_text)
        .find(|text| YEAR.is_match(text));
    if let Some(text) = from_heading {
        return Some(month_label(&text));
    }

    doc.select(&PARAGRAPHS)
        .map(element_text)
        .find(|text| YEAR.is_match(text) && MONTH_PHRASE.is_match(text))
        .map(|text| month_label(&text))
}

fn has_any_class(el: ElementRef, classes: &[&str]) -> bool {
    el.value().classes().any(|c| classes.contains(&c))
}

/// Availability of a calendar cell from its markup, strongest signal first.
pub fn cell_is_available(cell: ElementRef) -> bool {
    if has_any_class(cell, &AVAILABLE_CLASSES) {
        return true;
    }
    if has_any_class(cell, &UNAVAILABLE_CLASSES) {
        return false;
    }
    cell.select(&LINKS).next().is_some()
}

fn day_number(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || text.len() > 2 || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok().filter(|d| (1..=31).contains(d))
}

/// Parse a booking page into whole-day candidates.
pub fn parse_calendar_page(html: &str) -> Vec<Candidate> {
    let doc = Html::parse_document(html);

    let month = find_month_context(&doc).unwrap_or_else(|| {
        tracing::warn!(
            "Could not determine month from page headings or paragraphs, using {:?}",
            UNKNOWN_MONTH
        );
        UNKNOWN_MONTH.to_string()
    });

    // Content regions can nest and day numbers are often wrapped in inner
    // elements, so each day is taken from its outermost matching element
    let mut matched = HashSet::new();
    let mut candidates = Vec::new();

    for region in doc.select(&CONTENT_REGIONS) {
        for cell in region.select(&DAY_CELLS) {
            if cell.id() == region.id()
                || matched.contains(&cell.id())
                || cell.ancestors().any(|a| matched.contains(&a.id()))
            {
                continue;
            }
            let text: String = cell.text().collect();
            let Some(day) = day_number(&text) else {
                continue;
            };

            matched.insert(cell.id());
            candidates.push(Candidate::Day(DayCell {
                month_label: month.clone(),
                day: day.to_string(),
                available: cell_is_available(cell),
            }));
        }
    }

    if candidates.is_empty() {
        tracing::warn!("No day numbers found on page, the markup may have changed");
    }

    candidates
}

#[derive(Debug, Clone)]
pub struct ScrapeSource {
    page_url: String,
}

impl ScrapeSource {
    pub fn new(page_url: &str) -> Self {
        Self {
            page_url: page_url.to_string(),
        }
    }

    /// The page shows a single calendar view, so there is exactly one fetch
    /// and its failure leaves nothing to report.
    pub async fn collect(
        &self,
        fetcher: &Fetcher,
        _today: NaiveDate,
        _months_ahead: u32,
    ) -> Result<Vec<Candidate>, ExtractError> {
        tracing::info!("Fetching content from {}", self.page_url);
        let html = fetcher.get(&self.page_url, &[]).await?;
        let candidates = parse_calendar_page(&html);
        tracing::info!("Scraped {} potential appointment days", candidates.len());
        Ok(candidates)
    }
}
