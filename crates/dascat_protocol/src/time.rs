//! UTC day arithmetic on UNIX timestamps (f64 seconds).
//!
//! Timestamps are snapped to whole microseconds before any day computation so
//! that a chunk starting at `midnight - 1e-10` is not attributed to the previous day.

use chrono::{Datelike, NaiveDate};
use std::fmt;

pub const SECONDS_PER_DAY: i64 = 86_400;
const MICROS_PER_DAY: i64 = SECONDS_PER_DAY * 1_000_000;
/// `NaiveDate::num_days_from_ce()` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;
/// Fraction of a sample treated as an exact boundary hit.
const BOUNDARY_TOLERANCE: f64 = 1e-4;

/// Timestamp rounded to whole microseconds.
pub fn to_micros(ts: f64) -> i64 {
    (ts * 1_000_000.0).round() as i64
}

/// A UTC calendar day, stored as days since 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDay(i64);

impl UtcDay {
    pub fn of(ts: f64) -> Self {
        UtcDay(to_micros(ts).div_euclid(MICROS_PER_DAY))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        UtcDay(date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE)
    }

    pub fn to_date(self) -> Option<NaiveDate> {
        let days = i32::try_from(self.0 + UNIX_EPOCH_DAYS_FROM_CE).ok()?;
        NaiveDate::from_num_days_from_ce_opt(days)
    }

    /// Timestamp of 00:00:00 UTC on this day.
    pub fn start_ts(self) -> f64 {
        (self.0 * SECONDS_PER_DAY) as f64
    }

    /// Timestamp of 00:00:00 UTC on the following day.
    pub fn end_ts(self) -> f64 {
        ((self.0 + 1) * SECONDS_PER_DAY) as f64
    }

    pub fn next(self) -> Self {
        UtcDay(self.0 + 1)
    }

    pub fn prev(self) -> Self {
        UtcDay(self.0 - 1)
    }

    /// `YYYYMMDD` directory name.
    pub fn dir_name(self) -> String {
        self.to_string()
    }

    /// Four digit year directory name.
    pub fn year_name(self) -> String {
        match self.to_date() {
            Some(date) => format!("{:04}", date.year()),
            None => format!("day{}", self.0),
        }
    }
}

impl fmt::Display for UtcDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_date() {
            Some(date) => write!(f, "{}", date.format("%Y%m%d")),
            None => write!(f, "day{}", self.0),
        }
    }
}

/// Parse a `YYYYMMDD` directory name.
pub fn parse_day_dir(name: &str) -> Option<UtcDay> {
    if name.len() != 8 || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(name, "%Y%m%d")
        .ok()
        .map(UtcDay::from_date)
}

/// Deterministic decimal rendering used in output file names.
///
/// Microsecond precision, trailing zeros removed, at least one fractional digit:
/// `1700000000.0`, `1700000000.25`.
pub fn format_timestamp(ts: f64) -> String {
    let mut s = format!("{:.6}", ts);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.push('0');
    }
    s
}

/// Number of samples, starting at `start` and spaced `1/sps` apart, whose
/// timestamps fall strictly before `boundary`.
///
/// Both timestamps are snapped to microseconds first, so a boundary computed
/// from file-name arithmetic still lands exactly on a sample.
pub fn samples_before(start: f64, boundary: f64, sps: f64) -> usize {
    let micros = to_micros(boundary) - to_micros(start);
    let x = micros as f64 * sps / 1_000_000.0;
    if x <= 0.0 {
        return 0;
    }
    let nearest = x.round();
    if (x - nearest).abs() < BOUNDARY_TOLERANCE {
        nearest as usize
    } else {
        x.ceil() as usize
    }
}

/// Convert a sample count to seconds.
pub fn samples_to_seconds(samples: usize, sps: f64) -> f64 {
    samples as f64 / sps
}
