//! dascat command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dascat::{
    catalog_for, current_utc_day, plan_day, run, DascatConfig, DayOutcome, LogAlertSink,
    RunOptions,
};
use dascat_logging::{init_logging, LogConfig};
use dascat_protocol::time::parse_day_dir;
use dascat_protocol::UtcDay;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dascat", about = "Concatenate DAS packets into day-aligned chunks")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Concatenate every completed day that has no ledger yet
    Run {
        /// Configuration file
        #[arg(short, long, env = "DASCAT_CONFIG")]
        config: PathBuf,

        /// Only process this day (YYYYMMDD)
        #[arg(long, value_parser = parse_day)]
        day: Option<UtcDay>,

        /// Redo days that already have a ledger
        #[arg(long)]
        force: bool,
    },

    /// Show how a day's packets would be joined, without writing anything
    Plan {
        #[arg(short, long, env = "DASCAT_CONFIG")]
        config: PathBuf,

        /// Day to inspect (YYYYMMDD); all eligible days when omitted
        #[arg(long, value_parser = parse_day)]
        day: Option<UtcDay>,
    },

    /// Validate the configuration and reference file
    CheckConfig {
        #[arg(short, long, env = "DASCAT_CONFIG")]
        config: PathBuf,
    },
}

impl Commands {
    fn config_path(&self) -> &PathBuf {
        match self {
            Commands::Run { config, .. }
            | Commands::Plan { config, .. }
            | Commands::CheckConfig { config } => config,
        }
    }
}

fn parse_day(value: &str) -> std::result::Result<UtcDay, String> {
    parse_day_dir(value).ok_or_else(|| format!("expected a YYYYMMDD date, got '{}'", value))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match DascatConfig::load(cli.command.config_path()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(LogConfig {
        app_name: "dascat",
        verbose: cli.verbose,
        log_dir: config.logging.dir.as_deref(),
        filter: config.logging.filter.as_deref(),
    }) {
        eprintln!("Warning: logging unavailable: {:#}", err);
    }

    match run_command(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_command(command: Commands, config: &DascatConfig) -> Result<ExitCode> {
    let settings = config.resolve().context("Invalid configuration")?;
    let today = current_utc_day();

    match command {
        Commands::Run { day, force, .. } => {
            let options = RunOptions { day, force };
            let summary = run(&settings, &options, today, &LogAlertSink)?;
            for (day, outcome) in &summary.days {
                match outcome {
                    DayOutcome::Written(s) => println!(
                        "{}: {} chunks, {} samples, {} gaps, {} rejected",
                        day,
                        s.chunks.len(),
                        s.samples,
                        s.gaps,
                        s.rejected
                    ),
                    DayOutcome::AlreadyComplete => println!("{}: already complete", day),
                    DayOutcome::NotReady => println!("{}: not finished recording", day),
                }
            }
            for (day, reason) in &summary.failed {
                println!("{}: FAILED: {}", day, reason);
            }
            if summary.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Plan { day, .. } => {
            let catalog = catalog_for(&settings, today);
            let days = match day {
                Some(day) => vec![day],
                None => catalog.eligible_days()?,
            };
            let mut failed = false;
            for day in days {
                match plan_day(&settings, &catalog, day) {
                    Ok(plan) => print!("{}", plan),
                    Err(err) => {
                        println!("{}: FAILED: {:#}", day, err);
                        failed = true;
                    }
                }
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Commands::CheckConfig { .. } => {
            info!(
                sps = settings.reference.sps,
                chunk_samples = settings.assembler.chunk_samples,
                "Configuration valid"
            );
            println!(
                "ok: {} sps, {} x {} per packet, {} samples per chunk",
                settings.reference.sps,
                settings.reference.time_samples,
                settings.reference.shape().1,
                settings.assembler.chunk_samples
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "dascat", "-v", "run", "--config", "/etc/dascat.toml", "--day", "20231114", "--force",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { config, day, force } => {
                assert_eq!(config, PathBuf::from("/etc/dascat.toml"));
                assert_eq!(day.map(|d| d.dir_name()).as_deref(), Some("20231114"));
                assert!(force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_day_rejected() {
        assert!(Cli::try_parse_from(["dascat", "plan", "--config", "c.toml", "--day", "2023-11-14"]).is_err());
    }
}
