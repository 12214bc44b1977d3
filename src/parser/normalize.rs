use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::{America, Tz};
use regex::Regex;

use crate::error::{ParseError, ParseResult};
use crate::record::{EventRecord, RawEvent, RawReactorStatus, ReactorStatus, TimeValue};

/// Arizona stays on standard time all year.
const ARIZONA: &str = "AZ";
const ARIZONA_ZONE: &str = "AZMST";

// Two-digit years first: %Y would happily read "00" as year zero.
const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

// Reactors only exist in the lower 48, so four US zones plus UTC cover every
// report. Each abbreviation names a region; DST is decided by the zone rules.
static TIMEZONES: LazyLock<HashMap<&'static str, Tz>> = LazyLock::new(|| {
    HashMap::from([
        ("UTC", Tz::UTC),
        ("ET", Tz::EST5EDT),
        ("EST", Tz::EST5EDT),
        ("EDT", Tz::EST5EDT),
        ("CST", Tz::CST6CDT),
        ("CDT", Tz::CST6CDT),
        ("MST", Tz::MST7MDT),
        ("MDT", Tz::MST7MDT),
        ("PST", Tz::PST8PDT),
        ("PDT", Tz::PST8PDT),
        (ARIZONA_ZONE, America::Phoenix),
    ])
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2}):?(\d{2})(?::(\d{2}))?\s*\[?\s*([A-Za-z]*)\s*\]?\s*$").unwrap()
});
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").unwrap());
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").unwrap());

/// Convert the raw text fields of one report into a typed record.
pub fn normalize(raw: RawEvent) -> ParseResult<EventRecord> {
    let number = raw.event_number.as_deref().unwrap_or_default();
    let event_number = number
        .trim()
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidEventNumber(number.to_string()))?;

    // State only picks the timezone rules; region and reactor type are dropped.
    let observes_dst = raw.state.as_deref() != Some(ARIZONA);

    let update_date = raw.update_date.as_deref().map(parse_date).transpose()?;
    let event_time = raw
        .event_date
        .as_deref()
        .map(|d| convert_time(d, raw.event_time.as_deref(), observes_dst))
        .transpose()?;
    let report_time = raw
        .report_date
        .as_deref()
        .map(|d| convert_time(d, raw.report_time.as_deref(), true))
        .transpose()?;

    let affected = affected_units(raw.unit.as_deref().unwrap_or_default());
    let reactor_statuses = raw
        .reactor_statuses
        .into_iter()
        .map(|s| normalize_status(s, &affected))
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(EventRecord {
        url: raw.url,
        retracted: raw.retracted,
        event_number,
        event_type: raw.event_type.unwrap_or_default(),
        facility_name: raw.facility.unwrap_or_default(),
        emergency_class: raw.emergency_class.unwrap_or_default(),
        nrc_notified_by: raw.nrc_notified_by.unwrap_or_default(),
        hq_ops_officer: raw.hq_ops_officer.unwrap_or_default(),
        cfr_sections: raw.cfr_sections,
        people: raw.people,
        subject: raw.subject,
        body: raw.body,
        report_time,
        event_time,
        update_date,
        crawl_time: raw.crawl_time,
        reactor_statuses,
    })
}

pub fn parse_date(s: &str) -> ParseResult<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| ParseError::InvalidDate(s.to_string()))
}

/// Combine a local date and a `HH:MM [ZONE]` time into a UTC instant.
///
/// A time without any digit degrades to a bare date. With `observes_dst`
/// false, Mountain times are read in Arizona's fixed offset.
pub fn convert_time(date: &str, time: Option<&str>, observes_dst: bool) -> ParseResult<TimeValue> {
    let day = parse_date(date)?;
    let Some(time) = time.filter(|t| DIGIT_RE.is_match(t)) else {
        return Ok(TimeValue::Date(day));
    };

    let caps = TIME_RE
        .captures(time)
        .ok_or_else(|| ParseError::InvalidDate(format!("{} {}", date, time)))?;
    let field = |i: usize| caps.get(i).map_or(Ok(0), |m| m.as_str().parse::<u32>());
    let (h, m, s) = match (field(1), field(2), field(3)) {
        (Ok(h), Ok(m), Ok(s)) => (h, m, s),
        _ => return Err(ParseError::InvalidDate(time.to_string())),
    };
    let clock = NaiveTime::from_hms_opt(h, m, s)
        .ok_or_else(|| ParseError::InvalidDate(time.to_string()))?;

    let mut abbrev = caps.get(4).map_or("", |m| m.as_str()).to_uppercase();
    if !observes_dst && (abbrev == "MST" || abbrev == "MDT") {
        abbrev = ARIZONA_ZONE.to_string();
    }
    let tz = TIMEZONES
        .get(abbrev.as_str())
        .ok_or_else(|| ParseError::UnknownTimezone(abbrev.clone()))?;

    let local = NaiveDateTime::new(day, clock);
    // Ambiguous fall-back hours take the first occurrence; spring-forward
    // gaps are read as the hour after.
    let zoned = tz
        .from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .ok_or_else(|| ParseError::InvalidDate(format!("{} {}", date, time)))?;
    Ok(TimeValue::Instant(zoned.with_timezone(&Utc)))
}

/// Unit numbers inside brackets, e.g. `[1] [2] [ ]` gives {1, 2}.
pub fn affected_units(field: &str) -> HashSet<i64> {
    UNIT_RE
        .captures_iter(field)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

fn parse_int(field: &'static str, value: &str) -> ParseResult<i64> {
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn normalize_status(raw: RawReactorStatus, affected: &HashSet<i64>) -> ParseResult<ReactorStatus> {
    let unit = parse_int("unit", &raw.unit)?;
    let critical = match raw.critical.as_str() {
        "Y" => true,
        "N" => false,
        _ => {
            return Err(ParseError::InvalidCritical {
                unit,
                value: raw.critical.clone(),
            })
        }
    };
    Ok(ReactorStatus {
        unit,
        affected: affected.contains(&unit),
        scram_code: raw.scram_code,
        critical,
        initial_power: parse_int("initial power", &raw.initial_power)?,
        initial_mode: raw.initial_mode,
        current_power: parse_int("current power", &raw.current_power)?,
        current_mode: raw.current_mode,
    })
}
