//! Nonce-protected booking endpoint.
//!
//! The booking page embeds a rotating token that must accompany every
//! timeslot query. Queries are form POSTs, one per day, and the response is
//! an HTML fragment listing that day's timeslots.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;

use crate::core::ExtractError;
use crate::fetch::Fetcher;
use crate::planner::{REQUEST_DELAY, day_range, days_for_months, format_day, pause_between};
use crate::slots::dates::format_time_range;
use crate::slots::{Candidate, Slot};

// Tried in order, first capture group of the first match wins
static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""nonce"\s*:\s*"([A-Za-z0-9_-]+)""#,
        r#"data-nonce\s*=\s*["']([A-Za-z0-9_-]+)["']"#,
        r#"name\s*=\s*["']_?(?:wp)?nonce["']\s+value\s*=\s*["']([A-Za-z0-9_-]+)["']"#,
        r#"nonce\s*[:=]\s*["']([A-Za-z0-9_-]+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid regex"))
    .collect()
});

static TIME_RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}:\d{2})\s*(am|pm)\s*[-–—]\s*(\d{1,2}:\d{2})\s*(am|pm)")
        .expect("Invalid regex")
});

static SPACES_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s+spaces?\s+available").expect("Invalid regex")
});

static TIMESLOT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".timeslot").expect("Invalid selector"));
static TIMESLOT_RANGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".timeslot-range").expect("Invalid selector"));
static SPOTS_AVAILABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".spots-available").expect("Invalid selector"));

/// Pull the security token out of the booking page.
pub fn extract_token(page: &str) -> Result<String, ExtractError> {
    TOKEN_PATTERNS
        .iter()
        .find_map(|re| re.captures(page))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(ExtractError::TokenNotFound)
}

/// Remaining capacity from text like `"3 spaces available"`. Anything that
/// doesn't match counts as zero.
pub fn extract_spaces(text: &str) -> u32 {
    SPACES_PATTERN
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// Normalize `"10:00 am - 11:00 am"` into `"10:00 am – 11:00 am"`.
pub fn parse_time_range(text: &str) -> Option<String> {
    let caps = TIME_RANGE_PATTERN.captures(text)?;
    let start = format!("{} {}", &caps[1], caps[2].to_lowercase());
    let end = format!("{} {}", &caps[3], caps[4].to_lowercase());
    Some(format_time_range(&start, &end))
}

/// Parse the timeslot fragment returned for `date`.
///
/// Containers without a recognizable time range are skipped. A fragment
/// that contains no timeslots at all yields an empty list.
pub fn parse_timeslots(fragment: &str, date: NaiveDate) -> Vec<Slot> {
    let doc = Html::parse_fragment(fragment);
    let mut slots = Vec::new();

    for timeslot in doc.select(&TIMESLOT) {
        let range_text = timeslot
            .select(&TIMESLOT_RANGE)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let Some(time_range) = parse_time_range(&range_text) else {
            tracing::debug!("Skipping timeslot with unrecognized range {:?}", range_text.trim());
            continue;
        };

        let capacity = timeslot
            .select(&SPOTS_AVAILABLE)
            .next()
            .map(|el| extract_spaces(&el.text().collect::<String>()))
            .unwrap_or(0);

        slots.push(Slot::new(date, &time_range, capacity));
    }

    slots
}

/// How many times a query may be sent when the token is rejected. Between
/// attempts a fresh token is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn refresh_once() -> Self {
        Self { max_attempts: 2 }
    }

    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::refresh_once()
    }
}

enum DayResponse {
    Fragment(String),
    Rejected,
}

// The endpoint answers `-1` (or `0`) instead of an error status when the
// nonce check fails
fn is_rejection(body: &str) -> bool {
    matches!(body.trim(), "-1" | "0")
}

#[derive(Debug, Clone)]
pub struct TokenSource {
    booking_url: String,
    ajax_url: String,
    action: String,
    calendar_id: String,
    retry: RetryPolicy,
    delay: Duration,
}

impl TokenSource {
    pub fn new(booking_url: &str, ajax_url: &str, action: &str, calendar_id: &str) -> Self {
        Self {
            booking_url: booking_url.to_string(),
            ajax_url: ajax_url.to_string(),
            action: action.to_string(),
            calendar_id: calendar_id.to_string(),
            retry: RetryPolicy::default(),
            delay: REQUEST_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn fetch_token(&self, fetcher: &Fetcher) -> Result<String, ExtractError> {
        let page = fetcher.get(&self.booking_url, &[]).await?;
        extract_token(&page)
    }

    async fn post_day(
        &self,
        fetcher: &Fetcher,
        token: &str,
        day: &str,
    ) -> Result<DayResponse, ExtractError> {
        let form = [
            ("action", self.action.as_str()),
            ("nonce", token),
            ("date", day),
            ("calendar_id", self.calendar_id.as_str()),
        ];
        match fetcher.post_form(&self.ajax_url, &form).await {
            Ok(body) if is_rejection(&body) => Ok(DayResponse::Rejected),
            Ok(body) => Ok(DayResponse::Fragment(body)),
            Err(e) if e.status() == Some(403) => Ok(DayResponse::Rejected),
            Err(e) => Err(e.into()),
        }
    }

    /// Query a single day, refreshing `token` in place if it was rejected.
    pub async fn query_day(
        &self,
        fetcher: &Fetcher,
        token: &mut String,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, ExtractError> {
        let day = format_day(date);
        let mut attempt = 1;

        loop {
            match self.post_day(fetcher, token, &day).await? {
                DayResponse::Fragment(html) => return Ok(parse_timeslots(&html, date)),
                DayResponse::Rejected if self.retry.allows_retry(attempt) => {
                    tracing::warn!("Token rejected for {}, fetching a fresh one", day);
                    *token = self.fetch_token(fetcher).await?;
                    attempt += 1;
                }
                DayResponse::Rejected => {
                    return Err(ExtractError::TokenRejected { attempts: attempt });
                }
            }
        }
    }

    /// Query every day in the lookahead window. Failing to get the initial
    /// token is fatal; failures for a single day are logged and skipped.
    pub async fn collect(
        &self,
        fetcher: &Fetcher,
        today: NaiveDate,
        months_ahead: u32,
    ) -> Result<Vec<Candidate>, ExtractError> {
        let mut token = self.fetch_token(fetcher).await?;
        let dates = day_range(today, days_for_months(months_ahead));
        tracing::info!("Checking {} days starting {}", dates.len(), format_day(today));

        let mut candidates = Vec::new();
        for (i, date) in dates.iter().enumerate() {
            match self.query_day(fetcher, &mut token, *date).await {
                Ok(slots) if slots.is_empty() => {
                    tracing::debug!("No timeslots on {}", format_day(*date));
                }
                Ok(slots) => {
                    tracing::info!("Found {} timeslots on {}", slots.len(), format_day(*date));
                    candidates.extend(slots.into_iter().map(Candidate::from));
                }
                Err(e) => {
                    tracing::error!("Skipping {}: {}", format_day(*date), e);
                }
            }
            pause_between(i, dates.len(), self.delay).await;
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extract_spaces() {
        assert_eq!(extract_spaces("1 space available"), 1);
        assert_eq!(extract_spaces("5 spaces available"), 5);
        assert_eq!(extract_spaces("No spaces available"), 0);
        assert_eq!(extract_spaces(""), 0);
        assert_eq!(extract_spaces("  3 spaces available  "), 3);
        assert_eq!(extract_spaces("1 spaces available"), 1);
    }

    #[test]
    fn test_parse_time_range() {
        assert_eq!(
            parse_time_range("10:00 am - 11:00 am").as_deref(),
            Some("10:00 am – 11:00 am")
        );
        assert_eq!(
            parse_time_range(" 2:00PM – 3:00PM ").as_deref(),
            Some("2:00 pm – 3:00 pm")
        );
        assert_eq!(parse_time_range("Invalid time format"), None);
    }

    #[test]
    fn test_extract_token_priority() {
        let page = r#"<form data-nonce="second"></form>
            <script>var cfg = {"ajax_url": "/x", "nonce": "first"};</script>"#;
        assert_eq!(extract_token(page).unwrap(), "first");

        let page = r#"<input type="hidden" name="_wpnonce" value="f00ba4" />"#;
        assert_eq!(extract_token(page).unwrap(), "f00ba4");

        let page = "<script>booking.nonce = 'abc123';</script>";
        assert_eq!(extract_token(page).unwrap(), "abc123");

        assert!(matches!(
            extract_token("<html><body>nothing here</body></html>"),
            Err(ExtractError::TokenNotFound)
        ));
    }

    #[test]
    fn test_parse_single_timeslot() {
        let html = r#"<div class="timeslot">
            <div class="timeslot-range">10:00 am - 11:00 am</div>
            <div class="timeslot-time">
                <span class="spots-available">2 spaces available</span>
            </div>
        </div>"#;
        let slots = parse_timeslots(html, date(2024, 5, 15));
        assert_eq!(
            slots,
            vec![Slot {
                date: date(2024, 5, 15),
                time_range: Some(String::from("10:00 am – 11:00 am")),
                capacity: 2,
                available: true,
            }]
        );
    }

    #[test]
    fn test_parse_multiple_timeslots() -> Result<()> {
        let html = fs::read_to_string("./tests/data/timeslots.html")?;
        let slots = parse_timeslots(&html, date(2024, 5, 15));
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].capacity, 1);
        assert_eq!(slots[1].time_range.as_deref(), Some("2:00 pm – 3:00 pm"));
        assert_eq!(slots[1].capacity, 3);
        // Missing capacity text counts as full
        assert_eq!(slots[2].capacity, 0);
        assert!(!slots[2].available);

        Ok(())
    }

    #[test]
    fn test_parse_without_timeslots() {
        let slots = parse_timeslots("<div>No appointments available</div>", date(2024, 5, 15));
        assert!(slots.is_empty());
    }

    #[test]
    fn test_parse_skips_unrecognized_ranges() {
        let html = r#"<div class="timeslot">
            <div class="timeslot-range">Invalid time format</div>
            <span class="spots-available">2 spaces available</span>
        </div>"#;
        assert!(parse_timeslots(html, date(2024, 5, 15)).is_empty());
    }

    #[test]
    fn test_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
    }

    fn source(server: &mockito::Server) -> TokenSource {
        TokenSource::new(
            &format!("{}/book", server.url()),
            &format!("{}/ajax", server.url()),
            "get_timeslots",
            "7",
        )
        .with_delay(Duration::ZERO)
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(5)).unwrap()
    }

    const FRAGMENT: &str = r#"<div class="timeslot">
        <div class="timeslot-range">9:00 am - 9:30 am</div>
        <span class="spots-available">4 spaces available</span>
    </div>"#;

    #[tokio::test]
    async fn it_retries_once_with_a_fresh_token() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _stale = server
            .mock("GET", "/book")
            .with_status(200)
            .with_body(r#"<div data-nonce="stale1"></div>"#)
            .expect(1)
            .create_async()
            .await;
        let _fresh = server
            .mock("GET", "/book")
            .with_status(200)
            .with_body(r#"<div data-nonce="fresh2"></div>"#)
            .create_async()
            .await;
        let _rejected = server
            .mock("POST", "/ajax")
            .match_body(mockito::Matcher::Regex("nonce=stale1".into()))
            .with_status(200)
            .with_body("-1")
            .create_async()
            .await;
        let _accepted = server
            .mock("POST", "/ajax")
            .match_body(mockito::Matcher::Regex("nonce=fresh2".into()))
            .with_status(200)
            .with_body(FRAGMENT)
            .create_async()
            .await;

        let src = source(&server);
        let fetcher = fetcher();
        let mut token = src.fetch_token(&fetcher).await?;
        let slots = src.query_day(&fetcher, &mut token, date(2024, 5, 15)).await?;

        assert_eq!(token, "fresh2");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].time_range.as_deref(), Some("9:00 am – 9:30 am"));
        assert_eq!(slots[0].capacity, 4);

        Ok(())
    }

    #[tokio::test]
    async fn it_gives_up_after_second_rejection() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let token_page = server
            .mock("GET", "/book")
            .with_status(200)
            .with_body(r#"<div data-nonce="abc"></div>"#)
            .expect(2)
            .create_async()
            .await;
        let ajax = server
            .mock("POST", "/ajax")
            .with_status(403)
            .expect(2)
            .create_async()
            .await;

        let src = source(&server);
        let fetcher = fetcher();
        let mut token = src.fetch_token(&fetcher).await?;
        let err = src
            .query_day(&fetcher, &mut token, date(2024, 5, 15))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::TokenRejected { attempts: 2 }));
        token_page.assert_async().await;
        ajax.assert_async().await;

        Ok(())
    }

    #[tokio::test]
    async fn it_aborts_without_initial_token() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/book")
            .with_status(200)
            .with_body("<html><body>Maintenance</body></html>")
            .create_async()
            .await;
        let ajax = server
            .mock("POST", "/ajax")
            .expect(0)
            .create_async()
            .await;

        let result = source(&server)
            .collect(&fetcher(), date(2024, 5, 15), 1)
            .await;
        assert!(matches!(result, Err(ExtractError::TokenNotFound)));
        ajax.assert_async().await;

        Ok(())
    }

    #[tokio::test]
    async fn it_skips_failed_days() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/book")
            .with_status(200)
            .with_body(r#"<script>{"nonce":"n1"}</script>"#)
            .create_async()
            .await;
        let _broken = server
            .mock("POST", "/ajax")
            .match_body(mockito::Matcher::Regex("date=2024-05-15".into()))
            .with_status(500)
            .create_async()
            .await;
        let _ok = server
            .mock("POST", "/ajax")
            .match_body(mockito::Matcher::Regex("date=2024-05-(1[6-9]|[23][0-9])|date=2024-06".into()))
            .with_status(200)
            .with_body(FRAGMENT)
            .create_async()
            .await;

        let candidates = source(&server)
            .collect(&fetcher(), date(2024, 5, 15), 1)
            .await?;
        // 30 days queried, the first one failed
        assert_eq!(candidates.len(), 29);

        Ok(())
    }
}
