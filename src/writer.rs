use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::debug;

use crate::record::EventRecord;

/// Writes one pretty-printed JSON file per event. Re-running a page
/// overwrites its files.
pub struct EventWriter {
    dir: PathBuf,
}

/// `<eventNumber>-<YYYYMMDD>.json`, dated after the daily page.
pub fn file_name(event: &EventRecord, page_date: NaiveDate) -> String {
    format!("{}-{}.json", event.event_number, page_date.format("%Y%m%d"))
}

impl EventWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, event: &EventRecord, page_date: NaiveDate) -> Result<PathBuf> {
        let path = self.dir.join(file_name(event, page_date));
        let json = serde_json::to_string_pretty(event)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Event {} -> {}", event.event_number, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CfrSection, Person, ReactorStatus, TimeValue};

    fn event() -> EventRecord {
        EventRecord {
            url: "http://www.nrc.gov/event/2003/20030626en.html#en40001".into(),
            retracted: false,
            event_number: 40001,
            event_type: "Power Reactor".into(),
            facility_name: "PALO VERDE".into(),
            emergency_class: "NON EMERGENCY".into(),
            nrc_notified_by: "BOB JONES".into(),
            hq_ops_officer: "CHAUNCEY GOULD".into(),
            cfr_sections: vec![CfrSection {
                section: "50.72(b)(3)(iv)(A)".into(),
                title: "VALID SPECIF SYS ACTUATION".into(),
            }],
            people: vec![Person {
                name: "KRISS KENNEDY".into(),
                organization: String::new(),
            }],
            subject: "AUXILIARY FEEDWATER ACTUATION".into(),
            body: vec!["The licensee notified the NRC Resident Inspector.".into()],
            report_time: Some(TimeValue::Instant("2003-06-26T18:07:00Z".parse().unwrap())),
            event_time: Some(TimeValue::Date(NaiveDate::from_ymd_opt(2003, 6, 26).unwrap())),
            update_date: NaiveDate::from_ymd_opt(2003, 6, 27),
            crawl_time: "2012-05-01T12:00:00Z".parse().unwrap(),
            reactor_statuses: vec![ReactorStatus {
                unit: 2,
                affected: true,
                scram_code: "A/R".into(),
                critical: true,
                initial_power: 98,
                initial_mode: "Power Operation".into(),
                current_power: 0,
                current_mode: "Hot Standby".into(),
            }],
        }
    }

    #[test]
    fn writes_camel_case_iso_json() {
        let dir = std::env::temp_dir().join(format!("nrc_events_writer_{}", std::process::id()));
        let writer = EventWriter::new(&dir).unwrap();
        let page_date = NaiveDate::from_ymd_opt(2003, 6, 26).unwrap();

        let path = writer.write(&event(), page_date).unwrap();
        assert_eq!(path.file_name().unwrap(), "40001-20030626.json");

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["eventNumber"], 40001);
        assert_eq!(json["reportTime"], "2003-06-26T18:07:00Z");
        assert_eq!(json["eventTime"], "2003-06-26");
        assert_eq!(json["updateDate"], "2003-06-27");
        assert_eq!(json["reactorStatuses"][0]["scramCode"], "A/R");
        assert_eq!(json["people"][0]["organization"], "");

        // Second write of the same event replaces the file.
        let mut changed = event();
        changed.subject = "UPDATED".into();
        writer.write(&changed, page_date).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("UPDATED"));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
