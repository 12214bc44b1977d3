use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ParseError, ParseResult};

/// Lines at or past this width were never wrapped.
pub const TABLE_WIDTH: usize = 80;
/// Width of a full table row, borders included.
pub const ROW_WIDTH: usize = TABLE_WIDTH - 1;

pub const BORDER: char = '|';
pub const RULE: char = '+';

const NOT_PUBLIC: &str = "not for public distribution";
const DOUBLE_SPACED_SINCE: i32 = 2002;

static HEADER_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Event Notification Report for\s+[A-Za-z]+\.?\s+\d{1,2},\s+(\d{4})").unwrap()
});
// The type/number row of a report table: `|<type>   |Event Number: <n>   |`.
// Multi-line so it also finds rows inside a whole page's text.
pub static REPORT_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\|[^|\n]+\|[ \t]*Event[ \t]+Number:[ \t]*(\d+)[ \t]*\|[ \t\r]*$").unwrap()
});

/// Later pages put a blank line after every source line. The page year comes
/// from the report header marker; no marker means single spacing.
pub fn is_double_spaced(page_text: &str) -> bool {
    HEADER_MARKER_RE
        .captures(page_text)
        .and_then(|caps| caps[1].parse::<i32>().ok())
        .is_some_and(|year| year >= DOUBLE_SPACED_SINCE)
}

/// Split raw page text into logical lines.
pub fn logical_lines(text: &str, double_spaced: bool) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    let sep = if double_spaced { "\n\n" } else { "\n" };
    text.split(sep)
        .map(|l| l.trim_matches(|c| c == '\n' || c == '\r').to_string())
        .collect()
}

/// Drop restricted lines and blank out stray separators.
fn clean(line: String) -> Option<String> {
    if line.to_lowercase().contains(NOT_PUBLIC) {
        return None;
    }
    // Form feeds count as whitespace here.
    match line.trim() {
        "" | "." => Some(String::new()),
        _ => Some(line),
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn wrapped_onto(line: &str, next: Option<&String>) -> bool {
    if !line.starts_with(BORDER) || width(line) >= TABLE_WIDTH {
        return false;
    }
    match next {
        Some(n) if n == "|" => true,
        Some(n) => {
            !n.is_empty() && width(n) < TABLE_WIDTH && !n.starts_with([BORDER, RULE])
        }
        None => false,
    }
}

/// Undo the bad line wraps of an earlier rendering step.
///
/// A merged row must come out exactly `ROW_WIDTH` wide; anything else means
/// the wrap pattern is one this code has never seen.
pub fn repair(lines: Vec<String>) -> ParseResult<Vec<String>> {
    let mut out = Vec::with_capacity(lines.len());
    let mut iter = lines.into_iter().filter_map(clean).peekable();

    while let Some(line) = iter.next() {
        if !wrapped_onto(&line, iter.peek()) {
            out.push(line);
            continue;
        }
        let Some(next) = iter.next() else {
            out.push(line);
            continue;
        };
        let merged = format!("{} {}", line, next);
        if width(&merged) != ROW_WIDTH {
            return Err(ParseError::violation(
                "line repair",
                format!(
                    "merged line is {} columns, expected {}: {:?}",
                    width(&merged),
                    ROW_WIDTH,
                    merged
                ),
            ));
        }
        out.push(merged);
    }

    Ok(out)
}

/// Cut repaired lines into one group per report.
///
/// Reports carry no delimiter; the event-number header sits a line or two
/// into each report, so a report starts right after the last blank line seen
/// before its header. The open report ends where the next one starts.
pub fn split_reports(lines: &[String]) -> ParseResult<Vec<&[String]>> {
    let mut reports = Vec::new();
    let mut open: Option<usize> = None;
    let mut after_blank = 0;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            after_blank = i + 1;
            continue;
        }
        if !REPORT_HEADER_RE.is_match(line) {
            continue;
        }
        let start = after_blank;
        if let Some(prev) = open.replace(start) {
            if prev == start {
                return Err(ParseError::violation(
                    "report split",
                    format!("two report headers without a blank line before line {}", i),
                ));
            }
            reports.push(&lines[prev..start]);
        }
    }

    if let Some(prev) = open {
        reports.push(&lines[prev..]);
    }
    Ok(reports)
}
