#[derive(Debug, thiserror::Error, PartialEq)]
pub(crate) enum WindowConfigError {
    #[error("Window size must be positive")]
    NonPositiveWindowSize,
    #[error("Maximum window size in seconds is {0}")]
    WindowSizeTooLarge(i64),
    #[error("Response threshold must be positive, got: {0}")]
    NonPositiveResponseThreshold(f64),
    #[error("Availability threshold must be in [0.1...100], got: {0}")]
    AvailabilityThresholdOutOfRange(f64),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum IntervalError {
    #[error("Window became failing without an error record in window")]
    MissingErrorTimestamp,
    #[error("Window recovered without any record left in window")]
    MissingEndTimestamp,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MonitorError {
    #[error("Logs reading error")]
    Read(#[source] std::io::Error),
    #[error("Report writing error")]
    Write(#[source] std::io::Error),
}
