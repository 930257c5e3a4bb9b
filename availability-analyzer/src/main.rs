use std::{error::Error, process::ExitCode};

use clap::Parser;
use log::info;
use tokio::{
    io::{BufReader, stdin, stdout},
    signal::unix::{SignalKind, signal},
};

use crate::{
    config::{AppConfig, Cli},
    monitor::{AvailabilityMonitor, error::MonitorError, window::SlidingAvailabilityWindow},
    stats::ScanStatistics,
};

mod config;
mod monitor;
mod stats;

const CONFIG_ERROR_EXIT_CODE: u8 = 2;
const SCAN_EXIT_CODE: u8 = 0;

/// Loads the config and builds the window, or reports why not and yields the exit code.
fn configure(cli: &Cli) -> Result<(AppConfig, SlidingAvailabilityWindow), u8> {
    let config = AppConfig::try_from_cli(cli).map_err(|e| {
        eprintln!("{e}");

        CONFIG_ERROR_EXIT_CODE
    })?;

    let window = config.build_window().map_err(|e| {
        eprintln!("Invalid configuration: {e}");

        CONFIG_ERROR_EXIT_CODE
    })?;

    Ok((config, window))
}

/// Intervals written before a scan failure stay valid, so the scan exit code is always zero.
fn scan_exit_code(result: Result<ScanStatistics, MonitorError>) -> u8 {
    if let Err(e) = result {
        match e.source() {
            Some(cause) => eprintln!("Scan terminated: {e}: {cause}"),
            None => eprintln!("Scan terminated: {e}"),
        }
    }

    SCAN_EXIT_CODE
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Start
    env_logger::init();

    let cli = Cli::parse();

    let (config, window) = match configure(&cli) {
        Ok(configured) => configured,
        Err(code) => return ExitCode::from(code),
    };

    info!("Using config: {config}");

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Failed to install signal handlers: {e}");

            return ExitCode::FAILURE;
        }
    };

    let scan = AvailabilityMonitor::new(window)
        .with_flush_open_interval(config.flush_open_interval)
        .run_scan(BufReader::new(stdin()), stdout());

    tokio::select!(
      result = scan => ExitCode::from(scan_exit_code(result)),
      _ = sigint.recv() => {
        eprintln!("Received SIGINT, shutting down...");
        ExitCode::SUCCESS
      },
      _ = sigterm.recv() => {
        eprintln!("Received SIGTERM, shutting down...");
        ExitCode::SUCCESS
      },
    )
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("analyze").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn missing_threshold_exits_with_config_code() {
        Jail::expect_with(|_| {
            assert_eq!(configure(&cli(&["-t", "45"])).err(), Some(2));

            Ok(())
        });
    }

    #[test]
    fn invalid_threshold_exits_with_config_code() {
        Jail::expect_with(|_| {
            assert_eq!(configure(&cli(&["-t", "45", "-u", "0"])).err(), Some(2));
            assert_eq!(configure(&cli(&["-t", "0", "-u", "99"])).err(), Some(2));
            assert_eq!(
                configure(&cli(&["-t", "45", "-u", "99", "-w", "0"])).err(),
                Some(2)
            );

            Ok(())
        });
    }

    #[test]
    fn malformed_environment_exits_with_config_code() {
        Jail::expect_with(|jail| {
            jail.set_env("APP_WINDOW_SIZE", "soon");

            assert_eq!(configure(&cli(&["-t", "45", "-u", "99"])).err(), Some(2));

            Ok(())
        });
    }

    #[test]
    fn valid_config_is_configured() {
        Jail::expect_with(|_| {
            let (config, window) = configure(&cli(&["-t", "45", "-u", "99.9", "-w", "5"])).unwrap();

            assert_eq!(config.window_size, 5);
            assert_eq!(window.availability_threshold(), 99.9);

            Ok(())
        });
    }

    #[test]
    fn scan_outcomes_exit_cleanly() {
        assert_eq!(scan_exit_code(Ok(ScanStatistics::default())), 0);
        assert_eq!(
            scan_exit_code(Err(MonitorError::Read(std::io::Error::other("closed")))),
            0
        );
        assert_eq!(
            scan_exit_code(Err(MonitorError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed"
            )))),
            0
        );
    }
}
