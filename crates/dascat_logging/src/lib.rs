//! Logging setup for the dascat binary.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_LOG_FILTER: &str =
    "dascat=info,dascat_scout=info,dascat_concat=info,dascat_sinks=info";
const VERBOSE_LOG_FILTER: &str =
    "dascat=debug,dascat_scout=debug,dascat_concat=debug,dascat_sinks=debug";
/// Daily log files kept in the log directory.
const KEEP_LOG_FILES: usize = 30;

/// Logging configuration.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Directory for the daily log files; `~/.dascat/logs` when unset
    pub log_dir: Option<&'a Path>,
    /// Filter used when `RUST_LOG` is not set
    pub filter: Option<&'a str>,
}

/// Initialize tracing with a per-day log file and stderr output.
///
/// The file is `<log_dir>/<app>-YYYYMMDD.log` for the UTC date the process
/// starts on; repeated runs on one date append to it.
///
/// `RUST_LOG` takes precedence over the configured filter; `verbose` raises the
/// console to debug.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = match config.log_dir {
        Some(dir) => dir.to_path_buf(),
        None => logs_dir()?,
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;
    let file = open_daily_log(&log_dir, config.app_name, Utc::now().date_naive())?;
    if let Err(err) = prune_daily_logs(&log_dir, config.app_name, KEEP_LOG_FILES) {
        eprintln!("Failed to prune old log files in {}: {}", log_dir.display(), err);
    }

    let default_filter = config.filter.unwrap_or(DEFAULT_LOG_FILTER);
    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        file_filter.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// The dascat home directory: `$DASCAT_HOME` or `~/.dascat`.
pub fn dascat_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("DASCAT_HOME") {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".dascat"))
        .context("Could not determine home directory")
}

/// Default logs directory: `<home>/logs`.
pub fn logs_dir() -> Result<PathBuf> {
    Ok(dascat_home()?.join("logs"))
}

/// Open today's log file, appending to it if an earlier run wrote one.
fn open_daily_log(dir: &Path, app_name: &str, date: NaiveDate) -> Result<File> {
    let path = dir.join(log_file_name(app_name, date));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// `<app>-YYYYMMDD.log`
fn log_file_name(app_name: &str, date: NaiveDate) -> String {
    format!("{}-{}.log", sanitize_name(app_name), date.format("%Y%m%d"))
}

/// Remove all but the newest `keep` daily log files of `app_name`.
fn prune_daily_logs(dir: &Path, app_name: &str, keep: usize) -> io::Result<usize> {
    let prefix = format!("{}-", sanitize_name(app_name));
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(".log"))
                .map_or(false, |date| date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()))
        })
        .collect();
    // YYYYMMDD names sort by date
    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    for path in &logs[..excess] {
        fs::remove_file(path)?;
    }
    Ok(excess)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 11, d).unwrap()
    }

    #[test]
    fn test_daily_log_appends_across_runs() {
        let dir = tempdir().unwrap();
        open_daily_log(dir.path(), "dascat", date(14)).unwrap().write_all(b"first\n").unwrap();
        open_daily_log(dir.path(), "dascat", date(14)).unwrap().write_all(b"second\n").unwrap();

        let content = fs::read_to_string(dir.path().join("dascat-20231114.log")).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_prune_keeps_newest_days() {
        let dir = tempdir().unwrap();
        for d in 10..15 {
            open_daily_log(dir.path(), "dascat", date(d)).unwrap();
        }
        fs::write(dir.path().join("other.log"), "").unwrap();

        assert_eq!(prune_daily_logs(dir.path(), "dascat", 2).unwrap(), 3);
        let mut left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left, vec!["dascat-20231113.log", "dascat-20231114.log", "other.log"]);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("dascat run/2023"), "dascat_run_2023");
    }
}
