//! Packet start times encoded in file names.

use chrono::{LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use dascat_protocol::UtcDay;

/// Reject timestamps that cannot name a calendar day.
pub fn is_plausible(ts: f64) -> bool {
    ts.is_finite() && ts >= 0.0 && UtcDay::of(ts).to_date().is_some()
}

/// `das_SR_1700000000.5.h5` -> `1700000000.5`
///
/// The timestamp is the part after the last `_`, minus the extension.
pub fn container_timestamp(file_name: &str) -> Option<f64> {
    let ts: f64 = container_time_token(file_name)?.parse().ok()?;
    is_plausible(ts).then_some(ts)
}

/// `2023-11-14T22-13-20-250000.segy` -> UNIX seconds.
///
/// The name is wall-clock time in `tz`; the last dash separated group holds the
/// fractional second digits. A reading from the repeated hour when clocks fall
/// back is taken as standard time (the later instant). A reading from the hour
/// skipped when clocks spring forward names no instant and yields `None`.
pub fn segy_timestamp(file_name: &str, tz: Tz) -> Option<f64> {
    let stem = file_name.split('.').next()?;
    let (clock, fraction) = stem.rsplit_once('-')?;
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(clock, "%Y-%m-%dT%H-%M-%S").ok()?;
    let whole = match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => local.timestamp(),
        LocalResult::Ambiguous(_, standard) => standard.timestamp(),
        LocalResult::None => return None,
    };
    let digits = fraction.len().min(9);
    let frac: u64 = fraction[..digits].parse().ok()?;
    let frac = frac as f64 / 10f64.powi(digits as i32);

    let ts = whole as f64 + frac;
    is_plausible(ts).then_some(ts)
}

/// Part of a container name after the last `_`, without extension: `das_SR_17.h5` -> `17`.
pub fn container_time_token(file_name: &str) -> Option<&str> {
    let tail = file_name.rsplit('_').next()?;
    Some(tail.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_timestamp() {
        assert_eq!(container_timestamp("das_SR_1700000000.h5"), Some(1_700_000_000.0));
        assert_eq!(container_timestamp("das_SR_1700000000.5.h5"), Some(1_700_000_000.5));
        assert_eq!(container_timestamp("1700000010.h5"), Some(1_700_000_010.0));
        assert_eq!(container_timestamp("das_SR_latest.h5"), None);
        assert_eq!(container_timestamp("das_SR_-5.h5"), None);
    }

    use chrono_tz::Asia::Jerusalem;

    #[test]
    fn test_segy_timestamp_winter_time() {
        // 2023-11-15T00:13:20.25 IST (UTC+2) is 2023-11-14T22:13:20.25Z
        let ts = segy_timestamp("2023-11-15T00-13-20-250000.segy", Jerusalem).unwrap();
        assert!((ts - 1_700_000_000.25).abs() < 1e-6);

        let utc = segy_timestamp("2023-11-14T22-13-20-000000.segy", Tz::UTC).unwrap();
        assert_eq!(utc, 1_700_000_000.0);
    }

    #[test]
    fn test_segy_timestamp_summer_time() {
        // 2023-07-01T12:00:00 IDT (UTC+3) is 2023-07-01T09:00:00Z
        let ts = segy_timestamp("2023-07-01T12-00-00-000000.segy", Jerusalem).unwrap();
        assert_eq!(ts, 1_688_202_000.0);
    }

    #[test]
    fn test_segy_timestamp_repeated_hour_is_standard_time() {
        // clocks went back from 02:00 IDT to 01:00 IST on 2023-10-29
        let ts = segy_timestamp("2023-10-29T01-30-00-000000.segy", Jerusalem).unwrap();
        assert_eq!(ts, 1_698_535_800.0);
    }

    #[test]
    fn test_segy_timestamp_skipped_hour_is_rejected() {
        // clocks went forward from 02:00 IST to 03:00 IDT on 2023-03-24
        assert_eq!(segy_timestamp("2023-03-24T02-30-00-000000.segy", Jerusalem), None);
        assert!(segy_timestamp("2023-03-24T03-30-00-000000.segy", Jerusalem).is_some());
    }

    #[test]
    fn test_segy_timestamp_rejects_garbage() {
        assert_eq!(segy_timestamp("notes.segy", Tz::UTC), None);
        assert_eq!(segy_timestamp("2023-11-14T22-13-20-xx.segy", Tz::UTC), None);
    }

    #[test]
    fn test_container_time_token() {
        assert_eq!(container_time_token("das_SR_1700000000.h5"), Some("1700000000"));
    }
}
