use log::{debug, error, info, trace};
use shared::{LogRecord, parse_log_line};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    monitor::{
        error::MonitorError,
        interval::{FailingInterval, IntervalTracker},
        window::SlidingAvailabilityWindow,
    },
    stats::ScanStatistics,
};

pub(crate) mod error;
pub(crate) mod interval;
pub(crate) mod window;

/// Feeds parsed log lines through the window and the interval tracker,
/// writing one line per closed failing interval.
#[derive(Debug)]
pub(crate) struct AvailabilityMonitor {
    window: SlidingAvailabilityWindow,
    tracker: IntervalTracker,
    flush_open_interval: bool,
    statistics: ScanStatistics,
}

impl AvailabilityMonitor {
    pub(crate) fn new(window: SlidingAvailabilityWindow) -> Self {
        debug!(
            "Window size: {}s, response threshold: {}ms, availability threshold: {}%",
            window.window_size().num_seconds(),
            window.response_threshold_ms(),
            window.availability_threshold(),
        );

        Self {
            window,
            tracker: Default::default(),
            flush_open_interval: false,
            statistics: Default::default(),
        }
    }

    pub(crate) fn with_flush_open_interval(mut self, flush_open_interval: bool) -> Self {
        self.flush_open_interval = flush_open_interval;
        self
    }

    pub(crate) async fn run_scan<R, W>(
        mut self,
        reader: R,
        mut writer: W,
    ) -> Result<ScanStatistics, MonitorError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        // Raw segments so that a line with invalid UTF-8 is only malformed, not fatal
        let mut segments = reader.split(b'\n');

        while let Some(segment) = segments.next_segment().await.map_err(MonitorError::Read)? {
            self.statistics.lines += 1;

            let decoded = String::from_utf8_lossy(&segment);
            let line = decoded.strip_suffix('\r').unwrap_or(&*decoded);

            if line.trim().is_empty() {
                self.statistics.blank_lines += 1;
                continue;
            }

            let record = match parse_log_line(line) {
                Ok(record) => record,
                Err(e) => {
                    eprintln!(
                        "Wrong argument for parsing input line {}: {e}",
                        self.statistics.lines
                    );
                    self.statistics.malformed_lines += 1;
                    continue;
                }
            };

            if let Some(interval) = self.process_record(record) {
                self.report(&mut writer, &interval).await?;
            }
        }

        if self.flush_open_interval {
            let end = self
                .window
                .last_error_timestamp_in_window()
                .or(self.window.oldest_timestamp_in_window());

            if let Some(interval) = self.tracker.finish(end) {
                info!("Flushing failing interval still open at end of input");
                self.report(&mut writer, &interval).await?;
            }
        } else if self.tracker.is_open() {
            info!("Failing interval still open at end of input, not reported");
        }

        writer.flush().await.map_err(MonitorError::Write)?;

        self.statistics.print_statistics();

        Ok(self.statistics)
    }

    /// Returns the interval this record closes, if any. Invariant violations are
    /// logged and the record is otherwise skipped.
    pub(crate) fn process_record(&mut self, record: LogRecord) -> Option<FailingInterval> {
        let outcome = self.window.process_record(record);
        trace!(
            "Window holds {} records, {} errors",
            self.window.total_count(),
            self.window.error_count()
        );

        self.statistics.records += 1;
        if outcome.is_error {
            self.statistics.error_records += 1;
        }

        match self.tracker.observe(&outcome) {
            Ok(closed) => closed,
            Err(e) => {
                error!("Processing log line error: {e}, record: {record}");
                self.statistics.invariant_violations += 1;
                None
            }
        }
    }

    async fn report<W>(
        &mut self,
        writer: &mut W,
        interval: &FailingInterval,
    ) -> Result<(), MonitorError>
    where
        W: AsyncWrite + Unpin,
    {
        trace!("Reporting interval: {interval:?}");
        self.statistics.intervals += 1;

        writer
            .write_all(format!("{interval}\n").as_bytes())
            .await
            .map_err(MonitorError::Write)
    }
}
