//! Fatal-error reporting.

use dascat_protocol::UtcDay;
use std::sync::Mutex;
use tracing::error;

/// Receives day-level failures. The default implementation only logs.
pub trait AlertSink {
    fn day_failed(&self, day: UtcDay, error: &anyhow::Error);
}

/// Logs alerts at error level.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn day_failed(&self, day: UtcDay, err: &anyhow::Error) {
        error!(day = %day, "Day failed: {:#}", err);
    }
}

/// Keeps alerts in memory, for callers that report them in bulk.
#[derive(Debug, Default)]
pub struct CollectingAlertSink {
    alerts: Mutex<Vec<(UtcDay, String)>>,
}

impl CollectingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<(UtcDay, String)> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

impl AlertSink for CollectingAlertSink {
    fn day_failed(&self, day: UtcDay, err: &anyhow::Error) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push((day, format!("{:#}", err)));
        }
    }
}
