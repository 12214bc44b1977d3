use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// The only report type kept by either parser.
pub const POWER_REACTOR: &str = "Power Reactor";

/// One normalized event report, ready for the writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub url: String,
    pub retracted: bool,
    pub event_number: i64,
    pub event_type: String,
    pub facility_name: String,
    pub emergency_class: String,
    pub nrc_notified_by: String,
    pub hq_ops_officer: String,
    pub cfr_sections: Vec<CfrSection>,
    pub people: Vec<Person>,
    pub subject: String,
    pub body: Vec<String>,
    pub report_time: Option<TimeValue>,
    pub event_time: Option<TimeValue>,
    pub update_date: Option<NaiveDate>,
    pub crawl_time: DateTime<Utc>,
    pub reactor_statuses: Vec<ReactorStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactorStatus {
    pub unit: i64,
    pub affected: bool,
    pub scram_code: String,
    pub critical: bool,
    pub initial_power: i64,
    pub initial_mode: String,
    pub current_power: i64,
    pub current_mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CfrSection {
    pub section: String,
    pub title: String,
}

/// `organization` is empty, never missing, when the source omits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub name: String,
    pub organization: String,
}

/// A report/event timestamp. Sources without a time of day degrade to a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TimeValue {
    Instant(DateTime<Utc>),
    Date(NaiveDate),
}

#[cfg(test)]
impl TimeValue {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            TimeValue::Instant(t) => Some(*t),
            TimeValue::Date(_) => None,
        }
    }
}

/// Event fields as extracted from either layout, all still text.
///
/// Region, state and reactor type only live here: the normalizer reads the
/// state to pick a timezone and drops the rest.
#[derive(Debug, Clone, Default)]
pub struct RawEvent {
    pub url: String,
    pub retracted: bool,
    pub crawl_time: DateTime<Utc>,
    pub event_type: Option<String>,
    pub event_number: Option<String>,
    pub facility: Option<String>,
    pub region: Option<String>,
    pub state: Option<String>,
    pub unit: Option<String>,
    pub rx_type: Option<String>,
    pub nrc_notified_by: Option<String>,
    pub hq_ops_officer: Option<String>,
    pub emergency_class: Option<String>,
    pub report_date: Option<String>,
    pub report_time: Option<String>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub update_date: Option<String>,
    pub cfr_sections: Vec<CfrSection>,
    pub people: Vec<Person>,
    pub reactor_statuses: Vec<RawReactorStatus>,
    pub subject: String,
    pub body: Vec<String>,
}

impl RawEvent {
    pub fn new(url: impl Into<String>, crawl_time: DateTime<Utc>) -> Self {
        RawEvent {
            url: url.into(),
            retracted: false,
            crawl_time,
            ..Default::default()
        }
    }

    /// Take the first paragraph as the subject, the rest as the body.
    pub fn set_text(&mut self, paragraphs: Vec<String>) {
        let mut paragraphs = paragraphs.into_iter();
        self.subject = paragraphs.next().unwrap_or_default();
        self.body = paragraphs.collect();
    }
}

/// Column order shared by both layouts' reactor-status tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReactorStatus {
    pub unit: String,
    pub scram_code: String,
    pub critical: String,
    pub initial_power: String,
    pub initial_mode: String,
    pub current_power: String,
    pub current_mode: String,
}

impl RawReactorStatus {
    /// Build from cells in table order; `None` unless all seven are present.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        let [unit, scram, crit, ipwr, imode, cpwr, cmode] = cells else {
            return None;
        };
        let t = |s: &S| s.as_ref().trim().to_string();
        Some(RawReactorStatus {
            unit: t(unit),
            scram_code: t(scram),
            critical: t(crit),
            initial_power: t(ipwr),
            initial_mode: t(imode),
            current_power: t(cpwr),
            current_mode: t(cmode),
        })
    }
}
