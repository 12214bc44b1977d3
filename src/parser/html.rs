use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::fields::Field;
use super::lines::REPORT_HEADER_RE;
use crate::error::{ParseError, ParseResult};
use crate::record::{CfrSection, Person, RawEvent, RawReactorStatus, POWER_REACTOR};

static NAMED_ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[name]").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

static EVENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^en\d+").unwrap());
static REGION_STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+State:\s*(\w+)").unwrap());
static PERSON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+) \(([^)]*)\)$").unwrap());

const META_CELLS: usize = 6;

fn event_anchors(doc: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    doc.select(&NAMED_ANCHOR).filter(|a| {
        a.value()
            .attr("name")
            .is_some_and(|name| EVENT_ID_RE.is_match(name))
    })
}

/// True when the document carries per-event anchors of the HTML layout.
pub fn has_event_anchors(doc: &Html) -> bool {
    event_anchors(doc).next().is_some()
}

fn next_table(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
}

/// Trimmed, non-empty text nodes in document order.
fn stripped_strings(el: ElementRef<'_>) -> Vec<String> {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn cell_text(el: ElementRef<'_>) -> String {
    stripped_strings(el).join(" ")
}

/// Parse a daily page in the HTML table layout into raw events.
pub fn parse_page(url: &str, html: &str, crawl_time: DateTime<Utc>) -> ParseResult<Vec<RawEvent>> {
    let doc = Html::parse_document(html);
    let anchors: Vec<ElementRef> = event_anchors(&doc).collect();
    debug!("{}: {} event anchors", url, anchors.len());

    if anchors.is_empty() {
        let text: String = doc.root_element().text().collect();
        if REPORT_HEADER_RE.is_match(&text) {
            return Err(ParseError::FormatMismatch {
                url: url.to_string(),
                expected: "HTML",
            });
        }
    }

    let mut events = Vec::new();
    for anchor in anchors {
        if let Some(event) = parse_event(url, anchor, crawl_time)? {
            events.push(event);
        }
    }
    Ok(events)
}

fn parse_event(
    url: &str,
    anchor: ElementRef<'_>,
    crawl_time: DateTime<Utc>,
) -> ParseResult<Option<RawEvent>> {
    let name = anchor.value().attr("name").unwrap_or_default();
    let mut event = RawEvent::new(format!("{}#{}", url, name), crawl_time);

    // Three layout tables follow the anchor: metadata, reactor status, text.
    let meta = next_table(anchor)
        .ok_or_else(|| ParseError::violation(&event.url, "no metadata table"))?;
    let mut cells: Vec<ElementRef> = meta.select(&TD).collect();

    // Retracted reports grow an extra leading cell.
    if cells.first().is_some_and(|c| cell_text(*c).contains("RETRACTED")) {
        event.retracted = true;
        cells.remove(0);
    }
    let event_type = cells
        .first()
        .map(|c| cell_text(*c))
        .ok_or_else(|| ParseError::violation(&event.url, "empty metadata table"))?;
    if event_type != POWER_REACTOR {
        debug!("skipping {} of type {:?}", name, event_type);
        return Ok(None);
    }
    if cells.len() < META_CELLS {
        return Err(ParseError::violation(
            &event.url,
            format!("metadata table has {} cells, expected {}", cells.len(), META_CELLS),
        ));
    }
    event.event_type = Some(event_type);
    event.event_number = Some(
        cell_text(cells[1])
            .replace("Event Number:", "")
            .trim()
            .to_string(),
    );

    let site = stripped_strings(cells[2]);
    event.apply_lines(site.iter().map(String::as_str));
    if let Some(caps) = event.region.as_deref().and_then(|r| REGION_STATE_RE.captures(r)) {
        let (region, state) = (caps[1].to_string(), caps[2].to_string());
        event.set_field(Field::Region, region);
        event.set_field(Field::State, state);
    }

    let times = stripped_strings(cells[3]);
    event.apply_lines(times.iter().map(String::as_str));

    // Emergency class on the first line, then the CFR label, then sections.
    let class_lines = stripped_strings(cells[4]);
    event.apply_lines(class_lines.iter().take(1).map(String::as_str));
    event.cfr_sections = class_lines
        .iter()
        .skip(2)
        .map(|line| match line.split_once(" - ") {
            Some((section, title)) => CfrSection {
                section: section.trim().to_string(),
                title: title.trim().to_string(),
            },
            None => CfrSection {
                section: line.clone(),
                title: String::new(),
            },
        })
        .collect();

    event.people = stripped_strings(cells[5])
        .iter()
        .skip(1)
        .map(|line| {
            let caps = PERSON_RE.captures(line).ok_or_else(|| {
                ParseError::violation(&event.url, format!("unparseable person line {:?}", line))
            })?;
            Ok(Person {
                name: caps[1].trim().to_string(),
                organization: caps[2].trim().to_string(),
            })
        })
        .collect::<ParseResult<_>>()?;

    let status_table = next_table(meta)
        .ok_or_else(|| ParseError::violation(&event.url, "no reactor status table"))?;
    event.reactor_statuses = status_table
        .select(&TR)
        .skip(1)
        .filter_map(|row| {
            let values: Vec<String> = row.select(&TD).map(cell_text).collect();
            RawReactorStatus::from_cells(&values)
        })
        .collect();

    let text_table = next_table(status_table)
        .ok_or_else(|| ParseError::violation(&event.url, "no event text table"))?;
    let paragraphs = text_table
        .select(&TD)
        .next()
        .map(stripped_strings)
        .unwrap_or_default();
    event.set_text(paragraphs);

    Ok(Some(event))
}
