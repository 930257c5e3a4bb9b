use std::fmt::Display;

use chrono::TimeDelta;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::monitor::{error::WindowConfigError, window::SlidingAvailabilityWindow};

#[derive(Debug, thiserror::Error)]
pub(crate) enum AppConfigError {
    #[error("Error while parsing config: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("Window size out of range: {0} seconds")]
    InvalidWindowSize(u64),
    #[error(transparent)]
    InvalidThresholds(#[from] WindowConfigError),
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Reads access log lines from stdin and prints the intervals during which
/// availability dropped below the threshold.
#[derive(Debug, Parser, Serialize)]
#[command(name = "analyze", version)]
pub(crate) struct Cli {
    /// Maximum response time in milliseconds
    #[arg(short = 't', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    /// Minimum availability in percent
    #[arg(short = 'u', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<f64>,
    /// Sliding window size in seconds [default: 1]
    #[arg(short = 'w', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_size: Option<u64>,
    /// Report an interval that is still failing when input ends
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub flush_open_interval: bool,
}

fn default_window_size() -> u64 {
    1
}

fn default_flush_open_interval() -> bool {
    false
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppConfig {
    pub response_time: f64,
    pub availability: f64,
    #[serde(default = "default_window_size")]
    pub window_size: u64,
    #[serde(default = "default_flush_open_interval")]
    pub flush_open_interval: bool,
}

impl AppConfig {
    /// `APP_` prefixed environment variables, overridden by command line arguments.
    pub(crate) fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Env::prefixed("APP_"))
            .merge(Serialized::defaults(cli))
    }

    pub(crate) fn try_from_cli(cli: &Cli) -> Result<Self, AppConfigError> {
        Self::figment(cli).extract().map_err(Box::new).map_err(Into::into)
    }

    pub(crate) fn build_window(&self) -> Result<SlidingAvailabilityWindow, AppConfigError> {
        let window_size = i64::try_from(self.window_size)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or(AppConfigError::InvalidWindowSize(self.window_size))?;

        Ok(SlidingAvailabilityWindow::new(
            self.response_time,
            self.availability,
            window_size,
        )?)
    }
}

impl Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(
            format!(
                "{{response_time: \"{}\", availability: \"{}\", window_size: \"{}\", flush_open_interval: \"{}\"}}",
                self.response_time, self.availability, self.window_size, self.flush_open_interval,
            )
            .as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("analyze").chain(args.iter().copied())).unwrap()
    }

    fn load_config(args: &[&str]) -> AppConfig {
        AppConfig::try_from_cli(&cli(args)).unwrap()
    }

    #[test]
    fn cli_values_with_defaults() {
        Jail::expect_with(|_| {
            let config = load_config(&["-t", "45", "-u", "99.9"]);

            assert_eq!(config.response_time, 45.0);
            assert_eq!(config.availability, 99.9);
            assert_eq!(config.window_size, 1);
            assert!(!config.flush_open_interval);

            Ok(())
        });
    }

    #[test]
    fn cli_overrides_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("APP_RESPONSE_TIME", "100");
            jail.set_env("APP_AVAILABILITY", "95");
            jail.set_env("APP_WINDOW_SIZE", "30");
            jail.set_env("APP_FLUSH_OPEN_INTERVAL", "true");

            let config = load_config(&["--response-time", "50"]);

            assert_eq!(config.response_time, 50.0);
            assert_eq!(config.availability, 95.0);
            assert_eq!(config.window_size, 30);
            assert!(config.flush_open_interval);

            Ok(())
        });
    }

    #[test]
    fn missing_thresholds_fail_extraction() {
        Jail::expect_with(|_| {
            assert!(matches!(
                AppConfig::try_from_cli(&cli(&["-t", "45"])),
                Err(AppConfigError::Extract(_))
            ));

            Ok(())
        });
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        Jail::expect_with(|_| {
            let config = load_config(&["-t", "45", "-u", "120"]);
            assert!(matches!(
                config.build_window(),
                Err(AppConfigError::InvalidThresholds(
                    WindowConfigError::AvailabilityThresholdOutOfRange(_)
                ))
            ));

            let config = load_config(&["-t", "45", "-u", "99", "-w", "0"]);
            assert!(matches!(
                config.build_window(),
                Err(AppConfigError::InvalidThresholds(
                    WindowConfigError::NonPositiveWindowSize
                ))
            ));

            let config = load_config(&["-t", "45", "-u", "99", "-w", "18446744073709551615"]);
            assert!(matches!(
                config.build_window(),
                Err(AppConfigError::InvalidWindowSize(_))
            ));

            Ok(())
        });
    }

    #[test]
    fn builds_window_from_config() {
        Jail::expect_with(|_| {
            let config = load_config(&["-t", "45", "-u", "99.9", "-w", "60"]);
            let window = config.build_window().unwrap();

            assert_eq!(window.window_size(), TimeDelta::seconds(60));
            assert_eq!(window.response_threshold_ms(), 45.0);
            assert_eq!(window.availability_threshold(), 99.9);

            Ok(())
        });
    }
}
