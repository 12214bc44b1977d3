use thiserror::Error;

/// Errors raised while turning a daily page into event records.
///
/// Filtered reports (wrong event type, separator rows, unknown labels) never
/// show up here; every variant aborts the run.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A fixed-offset or structural assumption about the source layout broke.
    #[error("format violation in {context}: {detail}")]
    FormatViolation { context: String, detail: String },

    /// The date-selected parser found the other layout on the page.
    #[error("{url} does not look like a {expected} page")]
    FormatMismatch { url: String, expected: &'static str },

    #[error("invalid event number: {0:?}")]
    InvalidEventNumber(String),

    #[error("invalid {field} value: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unit {unit}: critical flag must be Y or N, got {value:?}")]
    InvalidCritical { unit: i64, value: String },

    #[error("invalid date/time: {0:?}")]
    InvalidDate(String),

    #[error("unknown timezone abbreviation {0:?}")]
    UnknownTimezone(String),
}

impl ParseError {
    pub fn violation(context: impl Into<String>, detail: impl Into<String>) -> Self {
        ParseError::FormatViolation {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
