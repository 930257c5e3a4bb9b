use std::fmt::Display;

use chrono::{DateTime, NaiveDateTime, Utc};
use itertools::Itertools;

/// `dd/MM/yyyy:HH:mm:ss`, as found in the access log timestamp field.
pub const LOG_TIMESTAMP_FORMAT: &str = "%d/%m/%Y:%H:%M:%S";

const LOG_LINE_FIELD_COUNT: usize = 14;
const TIMESTAMP_FIELD: usize = 3;
const STATUS_CODE_FIELD: usize = 8;
const RESPONSE_TIME_FIELD: usize = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("Log line must contain {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("Invalid timestamp: \"{0}\"")]
    InvalidTimestamp(String),
    #[error("Invalid status code: \"{0}\"")]
    InvalidStatusCode(String),
    #[error("Invalid response time: \"{0}\"")]
    InvalidResponseTime(String),
}

/// A single access log entry reduced to the fields the availability monitor needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub status_code: i32,
    pub response_time_ms: f64,
}

impl LogRecord {
    pub fn new(timestamp: DateTime<Utc>, status_code: i32, response_time_ms: f64) -> Self {
        Self {
            timestamp,
            status_code,
            response_time_ms,
        }
    }

    pub fn from_timestamp_str(
        timestamp: &str,
        status_code: i32,
        response_time_ms: f64,
    ) -> Result<Self, RecordParseError> {
        Ok(Self::new(
            parse_timestamp(timestamp)?,
            status_code,
            response_time_ms,
        ))
    }
}

impl Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(
            format!(
                "{{timestamp: \"{}\", status_code: \"{}\", response_time_ms: \"{}\"}}",
                self.timestamp.format(LOG_TIMESTAMP_FORMAT),
                self.status_code,
                self.response_time_ms,
            )
            .as_str(),
        )
    }
}

/// Timestamps carry no usable zone information and are interpreted as UTC.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, RecordParseError> {
    NaiveDateTime::parse_from_str(timestamp, LOG_TIMESTAMP_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|_| RecordParseError::InvalidTimestamp(timestamp.to_owned()))
}

pub fn parse_log_line(line: &str) -> Result<LogRecord, RecordParseError> {
    let fields = line.split_whitespace().collect_vec();

    if fields.len() != LOG_LINE_FIELD_COUNT {
        Err(RecordParseError::FieldCount {
            expected: LOG_LINE_FIELD_COUNT,
            found: fields.len(),
        })?;
    }

    // Leading '[' of the bracketed timestamp
    let raw_timestamp = fields[TIMESTAMP_FIELD];
    let timestamp = raw_timestamp
        .char_indices()
        .nth(1)
        .map(|(i, _)| &raw_timestamp[i..])
        .ok_or_else(|| RecordParseError::InvalidTimestamp(raw_timestamp.to_owned()))?;

    let status_code = fields[STATUS_CODE_FIELD]
        .parse()
        .map_err(|_| RecordParseError::InvalidStatusCode(fields[STATUS_CODE_FIELD].to_owned()))?;

    let response_time_ms = fields[RESPONSE_TIME_FIELD]
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite() && *t >= 0.0)
        .ok_or_else(|| {
            RecordParseError::InvalidResponseTime(fields[RESPONSE_TIME_FIELD].to_owned())
        })?;

    Ok(LogRecord::new(
        parse_timestamp(timestamp)?,
        status_code,
        response_time_ms,
    ))
}
