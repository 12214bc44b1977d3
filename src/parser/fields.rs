use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::record::RawEvent;

/// Canonical names for the labelled fields found in either report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    EventType,
    EventNumber,
    Facility,
    Region,
    State,
    Unit,
    RxType,
    NrcNotifiedBy,
    HqOpsOfficer,
    EmergencyClass,
    CfrSections,
    ReportDate,
    ReportTime,
    EventDate,
    EventTime,
    UpdateDate,
    People,
    ReactorStatus,
    ScramCode,
    Critical,
    InitialPower,
    InitialMode,
    CurrentPower,
    CurrentMode,
    Subject,
    Body,
}

// Keys are lowercase; the text layout shouts its labels, the HTML one doesn't.
const LABELS: &[(&str, Field)] = &[
    ("event type", Field::EventType),
    ("event number", Field::EventNumber),
    ("facility", Field::Facility),
    ("region", Field::Region),
    ("state", Field::State),
    ("unit", Field::Unit),
    ("rx type", Field::RxType),
    ("rxtype", Field::RxType),
    ("nrc notified by", Field::NrcNotifiedBy),
    ("hq ops officer", Field::HqOpsOfficer),
    ("emergency class", Field::EmergencyClass),
    ("10 cfr section", Field::CfrSections),
    ("notification date", Field::ReportDate),
    ("notification time", Field::ReportTime),
    ("event date", Field::EventDate),
    ("event time", Field::EventTime),
    ("last update date", Field::UpdateDate),
    ("person (organization)", Field::People),
    ("reactor status", Field::ReactorStatus),
    ("scram code", Field::ScramCode),
    ("rx crit", Field::Critical),
    ("initial pwr", Field::InitialPower),
    ("init pwr", Field::InitialPower),
    ("initial rx mode", Field::InitialMode),
    ("current pwr", Field::CurrentPower),
    ("curr pwr", Field::CurrentPower),
    ("current rx mode", Field::CurrentMode),
    ("subject", Field::Subject),
    ("event text", Field::Body),
];

static FIELD_MAP: LazyLock<HashMap<&'static str, Field>> =
    LazyLock::new(|| LABELS.iter().copied().collect());

static LABEL_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^:]+?)\s*:\s*(.*?)\s*$").unwrap());

impl Field {
    /// Case-insensitive label lookup. Unknown labels map to `None`.
    pub fn from_label(label: &str) -> Option<Field> {
        let key = label.split_whitespace().collect::<Vec<_>>().join(" ");
        FIELD_MAP.get(key.to_lowercase().as_str()).copied()
    }
}

/// Split a `Label: value` line on its first colon and map the label.
pub fn map_line(line: &str) -> Option<(Field, String)> {
    let caps = LABEL_VALUE_RE.captures(line)?;
    let field = Field::from_label(&caps[1])?;
    Some((field, caps[2].to_string()))
}

impl RawEvent {
    /// Store a scalar field. List-valued and per-unit fields are assembled by
    /// the parsers themselves, so those labels are ignored here.
    pub fn set_field(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::EventType => &mut self.event_type,
            Field::EventNumber => &mut self.event_number,
            Field::Facility => &mut self.facility,
            Field::Region => &mut self.region,
            Field::State => &mut self.state,
            Field::Unit => &mut self.unit,
            Field::RxType => &mut self.rx_type,
            Field::NrcNotifiedBy => &mut self.nrc_notified_by,
            Field::HqOpsOfficer => &mut self.hq_ops_officer,
            Field::EmergencyClass => &mut self.emergency_class,
            Field::ReportDate => &mut self.report_date,
            Field::ReportTime => &mut self.report_time,
            Field::EventDate => &mut self.event_date,
            Field::EventTime => &mut self.event_time,
            Field::UpdateDate => &mut self.update_date,
            Field::Subject => {
                self.subject = value;
                return;
            }
            _ => return,
        };
        *slot = Some(value);
    }

    /// Map every `Label: value` line; unmapped labels are skipped.
    pub fn apply_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            if let Some((field, value)) = map_line(line) {
                self.set_field(field, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn lookup_ignores_case_and_spacing() {
        assert_eq!(Field::from_label("HQ OPS Officer"), Some(Field::HqOpsOfficer));
        assert_eq!(Field::from_label("HQ OPS OFFICER"), Some(Field::HqOpsOfficer));
        assert_eq!(Field::from_label("  NRC  NOTIFIED BY "), Some(Field::NrcNotifiedBy));
        assert_eq!(Field::from_label("RXTYPE"), Some(Field::RxType));
        assert_eq!(Field::from_label("RX Type"), Some(Field::RxType));
    }

    #[test]
    fn unknown_label_is_none() {
        assert_eq!(Field::from_label("Weather"), None);
        assert!(map_line("Weather: sunny").is_none());
        assert!(map_line("no colon here").is_none());
    }

    #[test]
    fn splits_on_first_colon_only() {
        let (field, value) = map_line("Notification Time: 14:07 [ET]").unwrap();
        assert_eq!(field, Field::ReportTime);
        assert_eq!(value, "14:07 [ET]");
    }

    #[test]
    fn apply_lines_sets_scalars() {
        let mut raw = RawEvent::new("u", Utc::now());
        raw.apply_lines([
            "Facility: DIABLO CANYON",
            "Last Update Date: 06/26/2003",
            "Mystery Label: ignored",
            "10 CFR Section:",
        ]);
        assert_eq!(raw.facility.as_deref(), Some("DIABLO CANYON"));
        assert_eq!(raw.update_date.as_deref(), Some("06/26/2003"));
        assert!(raw.cfr_sections.is_empty());
    }
}
