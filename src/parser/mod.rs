pub mod fields;
pub mod html;
pub mod lines;
pub mod normalize;
pub mod text;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::error::{ParseError, ParseResult};
use crate::record::EventRecord;

static PAGE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{8})en[^/]*$").unwrap());

/// The two historical layouts of a daily report page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Fixed-width ASCII tables, pages dated on or before the cutover.
    Text,
    /// HTML layout tables, pages dated after the cutover.
    Html,
}

impl ReportFormat {
    /// Pick the layout from the page's URL date. No content sniffing: a page
    /// filed under the wrong date fails to parse instead.
    pub fn for_url(url: &str, cutover: NaiveDate) -> ParseResult<Self> {
        let date = page_date(url)?;
        Ok(if date <= cutover {
            ReportFormat::Text
        } else {
            ReportFormat::Html
        })
    }
}

/// The `YYYYMMDD` date a daily page is named after.
pub fn page_date(url: &str) -> ParseResult<NaiveDate> {
    PAGE_DATE_RE
        .captures(url)
        .and_then(|caps| NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok())
        .ok_or_else(|| ParseError::violation(url, "no YYYYMMDD date in page URL"))
}

/// Two-pass pipeline: page → raw events (per layout) → normalized records.
pub fn process_page(
    url: &str,
    body: &str,
    cutover: NaiveDate,
    crawl_time: DateTime<Utc>,
) -> ParseResult<Vec<EventRecord>> {
    let raw = match ReportFormat::for_url(url, cutover)? {
        ReportFormat::Text => text::parse_page(url, body, crawl_time)?,
        ReportFormat::Html => html::parse_page(url, body, crawl_time)?,
    };
    raw.into_iter().map(normalize::normalize).collect()
}

// ── Tests ──
