use std::fmt::Display;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::monitor::{
    error::IntervalError,
    window::{RecordOutcome, WindowTransition},
};

const REPORT_TIME_FORMAT: &str = "%H:%M:%S";

/// Counters of a failing period that has not recovered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenInterval {
    start: DateTime<Utc>,
    error_count: usize,
    total_count: usize,
}

impl OpenInterval {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            error_count: 0,
            total_count: 0,
        }
    }

    fn consider(&mut self, is_error: bool) {
        if is_error {
            self.error_count += 1;
        }
        self.total_count += 1;
    }

    fn close(self, end: DateTime<Utc>) -> FailingInterval {
        FailingInterval {
            start: self.start,
            end,
            error_count: self.error_count,
            total_count: self.total_count,
        }
    }
}

/// A closed failing period. Displays as `HH:MM:SS HH:MM:SS NN.N` in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FailingInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub error_count: usize,
    pub total_count: usize,
}

impl FailingInterval {
    /// Availability over the records seen while the interval was open,
    /// rounded half up to one decimal.
    pub(crate) fn availability(&self) -> f64 {
        if self.total_count == 0 {
            return 100.0;
        }

        let availability =
            100.0 * (self.total_count - self.error_count) as f64 / self.total_count as f64;

        (availability * 10.0 + 0.5).floor() / 10.0
    }
}

impl Display for FailingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(
            format!(
                "{} {} {:.1}",
                self.start.format(REPORT_TIME_FORMAT),
                self.end.format(REPORT_TIME_FORMAT),
                self.availability(),
            )
            .as_str(),
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) enum TrackerState {
    #[default]
    Healthy,
    Failing(OpenInterval),
}

/// Opens an interval on every healthy to failing edge of the window and closes
/// it on the way back, counting each record observed in between.
#[derive(Debug, Default)]
pub(crate) struct IntervalTracker {
    state: TrackerState,
}

impl IntervalTracker {
    #[cfg(test)]
    pub(crate) fn state(&self) -> &TrackerState {
        &self.state
    }

    pub(crate) fn is_open(&self) -> bool {
        matches!(self.state, TrackerState::Failing(_))
    }

    /// Returns the interval closed by this record, if any.
    ///
    /// On error the tracker keeps its previous state.
    pub(crate) fn observe(
        &mut self,
        outcome: &RecordOutcome,
    ) -> Result<Option<FailingInterval>, IntervalError> {
        let (state, result) = match (std::mem::take(&mut self.state), outcome.transition) {
            (TrackerState::Healthy, WindowTransition::BecameFailing { first_error }) => {
                match first_error {
                    Some(start) => {
                        let mut interval = OpenInterval::new(start);
                        interval.consider(outcome.is_error);

                        debug!("Opened failing interval at {start}");
                        (TrackerState::Failing(interval), Ok(None))
                    }
                    None => (
                        TrackerState::Healthy,
                        Err(IntervalError::MissingErrorTimestamp),
                    ),
                }
            }
            (
                TrackerState::Failing(mut interval),
                WindowTransition::BecameHealthy { last_error, oldest },
            ) => match last_error.or(oldest) {
                Some(end) => {
                    interval.consider(outcome.is_error);
                    let closed = interval.close(end);

                    debug!("Closed failing interval: {closed:?}");
                    (TrackerState::Healthy, Ok(Some(closed)))
                }
                None => (
                    TrackerState::Failing(interval),
                    Err(IntervalError::MissingEndTimestamp),
                ),
            },
            (TrackerState::Failing(mut interval), _) => {
                interval.consider(outcome.is_error);
                (TrackerState::Failing(interval), Ok(None))
            }
            (TrackerState::Healthy, WindowTransition::BecameHealthy { .. }) => {
                warn!("Window recovered while no failing interval was open");
                (TrackerState::Healthy, Ok(None))
            }
            (TrackerState::Healthy, WindowTransition::Steady { .. }) => {
                (TrackerState::Healthy, Ok(None))
            }
        };

        self.state = state;
        result
    }

    /// Closes an interval still open at the end of input.
    pub(crate) fn finish(&mut self, end: Option<DateTime<Utc>>) -> Option<FailingInterval> {
        match std::mem::take(&mut self.state) {
            TrackerState::Failing(interval) => {
                let start = interval.start;
                Some(interval.close(end.unwrap_or(start)))
            }
            TrackerState::Healthy => None,
        }
    }
}
