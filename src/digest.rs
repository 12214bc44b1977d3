use std::collections::VecDeque;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use tracing::info;

use crate::config::Settings;
use crate::fetch::PageSource;

static HREF: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

// Daily pages are named after their date: YYYYMMDDen.html
static DAILY_PAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{8}en\.html?$").unwrap());

/// Daily report-page links of one digest page, resolved against its URL, in
/// document order.
pub fn daily_links(index_url: &str, html: &str) -> Result<Vec<String>> {
    let base = Url::parse(index_url).with_context(|| format!("Bad digest URL {}", index_url))?;
    let doc = Html::parse_document(html);

    doc.select(&HREF)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| DAILY_PAGE_RE.is_match(href))
        .map(|href| {
            base.join(href)
                .map(String::from)
                .with_context(|| format!("Bad link {:?} on {}", href, index_url))
        })
        .collect()
}

/// Walks the yearly digest pages lazily: a year's digest is only fetched once
/// every URL of the previous year has been handed out.
pub struct DigestCrawler {
    settings: Settings,
    years: VecDeque<i32>,
    pending: VecDeque<String>,
}

impl DigestCrawler {
    pub fn new(settings: &Settings, years: impl IntoIterator<Item = i32>) -> Self {
        Self {
            settings: settings.clone(),
            years: years.into_iter().collect(),
            pending: VecDeque::new(),
        }
    }

    /// Next daily page URL, or `None` once every year is exhausted. A digest
    /// fetch failure aborts the crawl.
    pub async fn next_url<S>(&mut self, source: &mut S) -> Result<Option<String>>
    where
        S: PageSource + ?Sized + Send,
    {
        loop {
            if let Some(url) = self.pending.pop_front() {
                return Ok(Some(url));
            }
            let Some(year) = self.years.pop_front() else {
                return Ok(None);
            };
            let urls = self.year_urls(year, source).await?;
            self.pending.extend(urls);
        }
    }

    /// All daily page URLs listed on one year's digest.
    pub async fn year_urls<S>(&self, year: i32, source: &mut S) -> Result<Vec<String>>
    where
        S: PageSource + ?Sized + Send,
    {
        let index_url = self.settings.index_url(year);
        let html = source
            .fetch(&index_url)
            .await
            .with_context(|| format!("Failed to fetch {} digest", year))?;
        let urls = daily_links(&index_url, &html)?;
        info!("Digest {}: {} daily pages", year, urls.len());
        Ok(urls)
    }
}
