use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, trace};
use shared::LogRecord;

use crate::monitor::error::WindowConfigError;

/// Upper bound on the window length, keeping the record buffer's capacity representable.
pub(crate) const MAX_WINDOW_SIZE_SECS: i64 = i32::MAX as i64 / 100;

pub(crate) const DEFAULT_RESPONSE_THRESHOLD_MS: f64 = 45.0;
pub(crate) const DEFAULT_AVAILABILITY_THRESHOLD: f64 = 99.9;
pub(crate) const DEFAULT_WINDOW_SIZE_SECS: i64 = 60;

pub(crate) const MIN_AVAILABILITY_THRESHOLD: f64 = 0.1;
pub(crate) const MAX_AVAILABILITY_THRESHOLD: f64 = 100.0;

/// A record is an error if it was answered with a 5xx status or slower than the threshold.
pub(crate) fn is_error_record(record: &LogRecord, response_threshold_ms: f64) -> bool {
    (500..600).contains(&record.status_code) || record.response_time_ms > response_threshold_ms
}

/// How the failing state of the window changed while admitting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowTransition {
    Steady {
        failing: bool,
    },
    BecameFailing {
        first_error: Option<DateTime<Utc>>,
    },
    BecameHealthy {
        last_error: Option<DateTime<Utc>>,
        oldest: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordOutcome {
    pub is_error: bool,
    pub transition: WindowTransition,
}

/// Trailing time window over the record stream.
///
/// Error and total counts are kept incrementally: each record is counted once on
/// admission and once on eviction, never by rescanning the window.
#[derive(Debug)]
pub(crate) struct SlidingAvailabilityWindow {
    records: VecDeque<LogRecord>,
    window_size: TimeDelta,
    response_threshold_ms: f64,
    availability_threshold: f64,
    total_count: usize,
    error_count: usize,
}

impl Default for SlidingAvailabilityWindow {
    fn default() -> Self {
        Self {
            records: Default::default(),
            window_size: TimeDelta::seconds(DEFAULT_WINDOW_SIZE_SECS),
            response_threshold_ms: DEFAULT_RESPONSE_THRESHOLD_MS,
            availability_threshold: DEFAULT_AVAILABILITY_THRESHOLD,
            total_count: 0,
            error_count: 0,
        }
    }
}

impl SlidingAvailabilityWindow {
    pub(crate) fn new(
        response_threshold_ms: f64,
        availability_threshold: f64,
        window_size: TimeDelta,
    ) -> Result<Self, WindowConfigError> {
        if window_size <= TimeDelta::zero() {
            Err(WindowConfigError::NonPositiveWindowSize)?;
        }

        if window_size.num_seconds() > MAX_WINDOW_SIZE_SECS {
            Err(WindowConfigError::WindowSizeTooLarge(MAX_WINDOW_SIZE_SECS))?;
        }

        // Negated comparisons also reject NaN
        if !(response_threshold_ms > 0.0) {
            Err(WindowConfigError::NonPositiveResponseThreshold(
                response_threshold_ms,
            ))?;
        }

        if !(MIN_AVAILABILITY_THRESHOLD..=MAX_AVAILABILITY_THRESHOLD)
            .contains(&availability_threshold)
        {
            Err(WindowConfigError::AvailabilityThresholdOutOfRange(
                availability_threshold,
            ))?;
        }

        Ok(Self {
            window_size,
            response_threshold_ms,
            availability_threshold,
            ..Default::default()
        })
    }

    pub(crate) fn is_error(&self, record: &LogRecord) -> bool {
        is_error_record(record, self.response_threshold_ms)
    }

    /// Admits `record` at the tail, then evicts every record at or before
    /// `record.timestamp - window_size` from the head.
    ///
    /// Records are expected in non-decreasing timestamp order.
    pub(crate) fn process_record(&mut self, record: LogRecord) -> RecordOutcome {
        let was_failing = self.is_failing();
        let is_error = self.is_error(&record);

        trace!("Admitting record: {record}, error: {is_error}");

        self.records.push_back(record);
        if is_error {
            self.error_count += 1;
        }

        if let Some(cutoff) = record.timestamp.checked_sub_signed(self.window_size) {
            while let Some(expired) = self
                .records
                .front()
                .filter(|r| r.timestamp <= cutoff)
                .copied()
            {
                self.records.pop_front();
                if self.is_error(&expired) {
                    self.error_count -= 1;
                }
            }
        }

        self.total_count = self.records.len();

        let transition = match (was_failing, self.is_failing()) {
            (false, true) => {
                debug!(
                    "Window became failing at {}, availability: {}",
                    record.timestamp,
                    self.availability()
                );
                WindowTransition::BecameFailing {
                    first_error: self.first_error_timestamp_in_window(),
                }
            }
            (true, false) => {
                debug!(
                    "Window recovered at {}, availability: {}",
                    record.timestamp,
                    self.availability()
                );
                WindowTransition::BecameHealthy {
                    last_error: self.last_error_timestamp_in_window(),
                    oldest: self.oldest_timestamp_in_window(),
                }
            }
            (_, failing) => WindowTransition::Steady { failing },
        };

        RecordOutcome {
            is_error,
            transition,
        }
    }

    /// Percentage of non-error records in the window, 100 when it is empty.
    pub(crate) fn availability(&self) -> f64 {
        if self.total_count == 0 {
            return 100.0;
        }

        100.0 * (self.total_count - self.error_count) as f64 / self.total_count as f64
    }

    pub(crate) fn is_failing(&self) -> bool {
        self.availability() < self.availability_threshold
    }

    pub(crate) fn first_error_timestamp_in_window(&self) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .find(|r| self.is_error(r))
            .map(|r| r.timestamp)
    }

    pub(crate) fn last_error_timestamp_in_window(&self) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .rev()
            .find(|r| self.is_error(r))
            .map(|r| r.timestamp)
    }

    pub(crate) fn oldest_timestamp_in_window(&self) -> Option<DateTime<Utc>> {
        self.records.front().map(|r| r.timestamp)
    }

    pub(crate) fn total_count(&self) -> usize {
        self.total_count
    }

    pub(crate) fn error_count(&self) -> usize {
        self.error_count
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }

    pub(crate) fn window_size(&self) -> TimeDelta {
        self.window_size
    }

    pub(crate) fn response_threshold_ms(&self) -> f64 {
        self.response_threshold_ms
    }

    pub(crate) fn availability_threshold(&self) -> f64 {
        self.availability_threshold
    }
}
