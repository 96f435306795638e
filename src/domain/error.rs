use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed interval '{0}': expected '<N> days HH:MM:SS' or 'HH:MM:SS'")]
    MalformedInterval(String),
    #[error("malformed timestamp '{0}': expected 'YYYY-MM-DD HH:MM:SS'")]
    MalformedTimestamp(String),
    #[error("invalid {field} component '{value}'")]
    InvalidComponent { field: &'static str, value: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("{0} must not be empty")]
    EmptyId(&'static str),
    #[error("duration_minutes must be >= {min}, got {actual}")]
    DurationOutOfRange { actual: u32, min: u32 },
    #[error("hour must be within 0..=23, got {0}")]
    InvalidHour(u32),
    #[error("invalid calendar date: {0}")]
    InvalidDate(String),
    #[error("malformed slot key '{0}': expected 'YYYY-MM-DD-H'")]
    MalformedSlotKey(String),
    #[error("scheduled task {0} has no parseable start_time")]
    MissingStartTime(String),
    #[error("unsupported task status: {0}")]
    UnknownStatus(String),
    #[error("unsupported report window: {0}")]
    UnknownWindow(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
}
