use std::fmt::Display;

use log::info;

/// Per-scan counters, reported once the input is exhausted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ScanStatistics {
    pub lines: usize,
    pub blank_lines: usize,
    pub malformed_lines: usize,
    pub records: usize,
    pub error_records: usize,
    pub intervals: usize,
    pub invariant_violations: usize,
}

impl ScanStatistics {
    pub(crate) fn print_statistics(&self) {
        info!("Scan finished: {self}");
    }
}

impl Display for ScanStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(
            format!(
                "{{lines: \"{}\", blank_lines: \"{}\", malformed_lines: \"{}\", records: \"{}\", error_records: \"{}\", intervals: \"{}\", invariant_violations: \"{}\"}}",
                self.lines,
                self.blank_lines,
                self.malformed_lines,
                self.records,
                self.error_records,
                self.intervals,
                self.invariant_violations,
            )
            .as_str(),
        )
    }
}
