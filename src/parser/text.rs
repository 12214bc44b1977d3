use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::fields::Field;
use super::html::has_event_anchors;
use super::lines::{self, BORDER, REPORT_HEADER_RE, RULE};
use crate::error::{ParseError, ParseResult};
use crate::record::{CfrSection, Person, RawEvent, RawReactorStatus, POWER_REACTOR};

// Offsets below count from the first line after the type/number header block.
const FIELD_LINES: std::ops::Range<usize> = 0..7;
const CFR_LINES: std::ops::Range<usize> = 8..10;
const PEOPLE_LINES: std::ops::Range<usize> = 7..10;
const STATUS_LINES: std::ops::Range<usize> = 13..16;
const EVENT_TEXT_LINE: usize = 17;
const BODY_START: usize = 19;

const EVENT_TEXT: &str = "EVENT TEXT";

static PRE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("pre").unwrap());

static FACILITY_REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s+REGION:\s*(\d+)\s*$").unwrap());
static UNIT_STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s+STATE:\s*([A-Z]{2})\s*$").unwrap());
static PAIR_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

// UNIT|SCRAM CODE|RX CRIT|INIT PWR|INITIAL RX MODE|CURR PWR|CURRENT RX MODE
static STATUS_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|([ \d]{4}) (.{10}) (.{7}) (.{8}) (.{19}) (.{8}) (.{15})\|$").unwrap()
});

/// Parse a legacy fixed-width daily page into raw events.
pub fn parse_page(url: &str, html: &str, crawl_time: DateTime<Utc>) -> ParseResult<Vec<RawEvent>> {
    let doc = Html::parse_document(html);
    if has_event_anchors(&doc) {
        return Err(ParseError::FormatMismatch {
            url: url.to_string(),
            expected: "text",
        });
    }

    let full_text: String = doc.root_element().text().collect();
    let pre: Vec<String> = doc
        .select(&PRE)
        .map(|e| e.text().collect::<String>())
        .collect();
    let text = if pre.is_empty() { full_text.clone() } else { pre.join("\n") };

    let raw_lines = lines::logical_lines(&text, lines::is_double_spaced(&full_text));
    let repaired = lines::repair(raw_lines)?;
    let reports = lines::split_reports(&repaired)?;
    debug!("{}: {} text reports", url, reports.len());

    let mut events = Vec::new();
    for report in reports {
        if let Some(event) = parse_report(url, report, crawl_time)? {
            events.push(event);
        }
    }
    Ok(events)
}

/// Parse one report's line group. `Ok(None)` means the report was filtered.
pub fn parse_report(
    url: &str,
    report: &[String],
    crawl_time: DateTime<Utc>,
) -> ParseResult<Option<RawEvent>> {
    let mut lines = report;
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines = &lines[..lines.len() - 1];
    }

    let mut event = RawEvent::new(url, crawl_time);
    if let Some(first) = lines.first() {
        if !first.starts_with([BORDER, RULE]) && first.to_uppercase().contains("RETRACTED") {
            event.retracted = true;
            lines = &lines[1..];
        }
    }

    let header = lines
        .get(1)
        .ok_or_else(|| ParseError::violation(url, "report too short for a type line"))?;
    let number = REPORT_HEADER_RE
        .captures(header)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ParseError::violation(url, format!("no event number in {:?}", header)))?;
    let event_type = split_columns(header).into_iter().next().unwrap_or_default();
    if event_type != POWER_REACTOR {
        debug!("skipping event {} of type {:?}", number, event_type);
        return Ok(None);
    }
    event.url = format!("{}#en{}", url, number);
    event.event_type = Some(event_type);
    event.event_number = Some(number);

    let rest = &lines[2..];
    let skip = rest.iter().take_while(|l| l.starts_with(RULE)).count();
    let rest = &rest[skip..];

    if !rest.get(EVENT_TEXT_LINE).is_some_and(|l| l.contains(EVENT_TEXT)) {
        return Err(ParseError::violation(
            &event.url,
            format!("{} marker missing at line {}", EVENT_TEXT, EVENT_TEXT_LINE),
        ));
    }

    parse_fields(&mut event, &rest[FIELD_LINES]);
    event.cfr_sections = column_pairs(&rest[CFR_LINES], 0)
        .map(|(section, title)| CfrSection { section, title })
        .collect();
    event.people = column_pairs(&rest[PEOPLE_LINES], 1)
        .map(|(name, organization)| Person { name, organization })
        .collect();
    event.reactor_statuses = rest[STATUS_LINES].iter().filter_map(|l| status_row(l)).collect();
    event.set_text(body_paragraphs(rest.get(BODY_START..).unwrap_or_default()));

    Ok(Some(event))
}

/// Split a table line into trimmed column texts, borders and rules alike.
fn split_columns(line: &str) -> Vec<String> {
    let inner = line.strip_prefix([BORDER, RULE]).unwrap_or(line);
    let inner = inner.strip_suffix([BORDER, RULE]).unwrap_or(inner);
    inner
        .split([BORDER, RULE])
        .map(|c| c.trim().to_string())
        .collect()
}

fn parse_fields(event: &mut RawEvent, block: &[String]) {
    for line in block {
        let columns = split_columns(line);
        event.apply_lines(columns.iter().map(String::as_str));
    }

    if let Some(caps) = event.facility.as_deref().and_then(|f| FACILITY_REGION_RE.captures(f)) {
        let (facility, region) = (caps[1].trim().to_string(), caps[2].to_string());
        event.set_field(Field::Facility, facility);
        event.set_field(Field::Region, region);
    }
    if let Some(caps) = event.unit.as_deref().and_then(|u| UNIT_STATE_RE.captures(u)) {
        let (unit, state) = (caps[1].trim().to_string(), caps[2].to_string());
        event.set_field(Field::Unit, unit);
        event.set_field(Field::State, state);
    }
}

/// Non-empty cells of one column, split on the first double-space gap.
/// A missing second half comes back empty.
fn column_pairs(block: &[String], column: usize) -> impl Iterator<Item = (String, String)> + '_ {
    block.iter().filter_map(move |line| {
        let cell = split_columns(line).into_iter().nth(column)?;
        if cell.is_empty() {
            return None;
        }
        let mut parts = PAIR_SPLIT_RE.splitn(&cell, 2);
        let first = parts.next().unwrap_or_default().to_string();
        let second = parts.next().unwrap_or_default().trim().to_string();
        Some((first, second))
    })
}

fn status_row(line: &str) -> Option<RawReactorStatus> {
    let caps = STATUS_ROW_RE.captures(line)?;
    let cells: Vec<&str> = (1..=7).map(|i| caps.get(i).map_or("", |m| m.as_str())).collect();
    let status = RawReactorStatus::from_cells(&cells)?;
    (!status.unit.is_empty()).then_some(status)
}

/// Each text line opens a paragraph unless it still carries the border
/// padding of a continuation line.
fn body_paragraphs(block: &[String]) -> Vec<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    for line in block.iter().take_while(|l| !l.starts_with(RULE)) {
        let content = line.strip_prefix(BORDER).unwrap_or(line);
        let content = content.strip_suffix(BORDER).unwrap_or(content).trim_end();
        if content.trim().is_empty() {
            continue;
        }
        match paragraphs.last_mut() {
            Some(prev) if content.starts_with(' ') => {
                prev.push(' ');
                prev.push_str(content.trim_start());
            }
            _ => paragraphs.push(content.trim_start().to_string()),
        }
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    fn crawl_time() -> DateTime<Utc> {
        "2012-05-01T12:00:00Z".parse().unwrap()
    }

    const URL: &str = "http://www.nrc.gov/reading-rm/doc-collections/event-status/event/2000/20000626en.html";

    #[test]
    fn columns_split_on_borders_and_rules() {
        let cols = split_columns("|FACILITY: X   REGION: 4|NOTIFICATION DATE: 06/26/2000|");
        assert_eq!(cols, vec!["FACILITY: X   REGION: 4", "NOTIFICATION DATE: 06/26/2000"]);
        let cols = split_columns("+-----+EVENT TIME: 10:30[PDT]|");
        assert_eq!(cols, vec!["-----", "EVENT TIME: 10:30[PDT]"]);
    }

    #[test]
    fn continuation_lines_join_previous_paragraph() {
        let block: Vec<String> = [
            "|SUBJECT LINE   |",
            "|               |",
            "|First line of  |",
            "| the paragraph.|",
            "+---------------+",
            "|not body       |",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(
            body_paragraphs(&block),
            vec!["SUBJECT LINE", "First line of the paragraph."]
        );
    }

    #[test]
    fn people_without_organization_get_empty_string() {
        let block = vec!["|x|JOHN DOE                      |".to_string()];
        let people: Vec<_> = column_pairs(&block, 1).collect();
        assert_eq!(people, vec![("JOHN DOE".to_string(), String::new())]);
    }

    #[test]
    fn parses_sample_page() {
        let events = parse_page(URL, &fixture("text_page.html"), crawl_time()).unwrap();
        // The fuel cycle facility report in the middle is filtered out.
        assert_eq!(events.len(), 2);

        let e = &events[0];
        assert!(e.retracted);
        assert_eq!(e.event_number.as_deref(), Some("37105"));
        assert_eq!(e.url, format!("{}#en37105", URL));
        assert_eq!(e.facility.as_deref(), Some("DIABLO CANYON"));
        assert_eq!(e.region.as_deref(), Some("4"));
        assert_eq!(e.unit.as_deref(), Some("[1] [ ]"));
        assert_eq!(e.state.as_deref(), Some("CA"));
        assert_eq!(e.report_time.as_deref(), Some("14:07[EDT]"));
        assert_eq!(e.event_time.as_deref(), Some("10:30[PDT]"));
        assert_eq!(e.emergency_class.as_deref(), Some("NOT APPLICABLE"));
        assert_eq!(e.nrc_notified_by.as_deref(), Some("JOHN SMITH"));
        assert_eq!(
            e.cfr_sections,
            vec![CfrSection {
                section: "50.72(b)(2)(iv)(B)".into(),
                title: "RPS ACTUATION - CRITICAL".into(),
            }]
        );
        assert_eq!(
            e.people,
            vec![
                Person { name: "LINDA SMITH".into(), organization: "R4".into() },
                Person { name: "JOHN DOE".into(), organization: String::new() },
            ]
        );
        assert_eq!(e.reactor_statuses.len(), 2);
        assert_eq!(e.reactor_statuses[0].scram_code, "M/R");
        assert_eq!(e.reactor_statuses[1].critical, "N");
        assert_eq!(e.subject, "MANUAL REACTOR TRIP FOLLOWING LOSS OF FEEDWATER");
        assert_eq!(e.body.len(), 1);
        assert!(e.body[0].starts_with("The licensee reported"));
        assert!(e.body[0].ends_with("pump."));

        let e = &events[1];
        assert!(!e.retracted);
        assert_eq!(e.event_number.as_deref(), Some("37107"));
        assert_eq!(e.state.as_deref(), Some("AZ"));
        assert_eq!(e.reactor_statuses.len(), 3);
    }

    #[test]
    fn body_mentioning_an_event_number_stays_in_its_report() {
        let original = format!("|{:<77}|", "The NRC resident inspector has been notified.");
        let mention = format!("|{:<77}|", "This updates Event Number: 37001 from last week.");
        let page = fixture("text_page.html");
        assert!(page.contains(&original));
        let page = page.replace(&original, &mention);

        let events = parse_page(URL, &page, crawl_time()).unwrap();
        assert_eq!(events.len(), 2);
        let e = &events[1];
        assert_eq!(e.event_number.as_deref(), Some("37107"));
        assert_eq!(
            e.body.last().map(String::as_str),
            Some("This updates Event Number: 37001 from last week.")
        );
    }

    #[test]
    fn missing_event_text_marker_is_fatal() {
        let page = fixture("text_page.html").replace("EVENT TEXT", "EVENT NOTE");
        let err = parse_page(URL, &page, crawl_time()).unwrap_err();
        assert!(matches!(err, ParseError::FormatViolation { .. }));
    }

    #[test]
    fn html_page_is_a_format_mismatch() {
        let err = parse_page(URL, &fixture("html_page.html"), crawl_time()).unwrap_err();
        assert!(matches!(err, ParseError::FormatMismatch { expected: "text", .. }));
    }
}
