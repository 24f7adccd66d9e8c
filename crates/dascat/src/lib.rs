//! Daily concatenation of DAS packets into day-aligned chunk files.
//!
//! A run walks the completed `YYYYMMDD` packet directories under the
//! configured local path, joins each day's packets into continuous chunks
//! and writes them below the output path, finishing each day with a
//! completion ledger.

pub mod alert;
pub mod config;
pub mod plan;
pub mod runner;

pub use alert::{AlertSink, CollectingAlertSink, LogAlertSink};
pub use config::{ConcatSettings, ConfigError, DascatConfig};
pub use plan::{plan_day, DayPlan, PlannedPacket};
pub use runner::{
    catalog_for, current_utc_day, run, run_day, DayOutcome, DaySummary, RunOptions, RunSummary,
};
