//! Per-day processing: catalog -> assembler -> writer -> ledger.
//!
//! A day's run owns every packet in its input directory and writes all of their
//! rows, also those that fall after midnight. The run stores where it stopped in
//! its ledger and the next day's run continues from that point, so a stream
//! crossing midnight is split once and nothing is left for a day that has no
//! input directory.

use crate::alert::AlertSink;
use crate::config::ConcatSettings;
use anyhow::{bail, Context, Result};
use dascat_concat::{assemble, ChunkAssembler, Packet, ResumePoint};
use dascat_protocol::UtcDay;
use dascat_scout::{PacketCatalog, PacketDescriptor};
use dascat_sinks::{ChunkWriter, DayLedger, WrittenChunk};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which days to process.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// A single day; all eligible backlog days when unset
    pub day: Option<UtcDay>,
    /// Redo days that already have a ledger
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub day: UtcDay,
    pub chunks: Vec<WrittenChunk>,
    pub samples: usize,
    /// Chunks that start after a recoverable gap or data loss
    pub gaps: usize,
    /// Rejected at listing time plus packets whose payload failed to load
    pub rejected: usize,
    /// Chunk files listed by an earlier run of this day that were not rewritten
    pub removed_stale: usize,
    /// The run continued where the previous day's run stopped
    pub resumed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Written(DaySummary),
    /// A ledger exists and `--force` was not given
    AlreadyComplete,
    /// Current UTC day or later
    NotReady,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub days: Vec<(UtcDay, DayOutcome)>,
    pub failed: Vec<(UtcDay, String)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn written(&self) -> impl Iterator<Item = &DaySummary> {
        self.days.iter().filter_map(|(_, outcome)| match outcome {
            DayOutcome::Written(summary) => Some(summary),
            _ => None,
        })
    }
}

/// Today's UTC day from the system clock.
pub fn current_utc_day() -> UtcDay {
    let now = chrono::Utc::now();
    UtcDay::of(now.timestamp() as f64)
}

pub fn catalog_for(settings: &ConcatSettings, today: UtcDay) -> PacketCatalog {
    PacketCatalog::new(
        &settings.local_path,
        settings.source.clone(),
        settings.reference.clone(),
        settings.unit_size,
        today,
    )
}

/// Process the requested days. A failing day is reported and does not stop the others.
pub fn run(
    settings: &ConcatSettings,
    options: &RunOptions,
    today: UtcDay,
    alerts: &dyn AlertSink,
) -> Result<RunSummary> {
    let catalog = catalog_for(settings, today);
    let days = match options.day {
        Some(day) => vec![day],
        None => catalog
            .eligible_days()
            .with_context(|| format!("Failed to list {}", settings.local_path.display()))?,
    };
    info!(days = days.len(), today = %today, "Starting run");

    let mut summary = RunSummary::default();
    for day in days {
        match run_day(settings, &catalog, day, options.force) {
            Ok(outcome) => summary.days.push((day, outcome)),
            Err(err) => {
                alerts.day_failed(day, &err);
                summary.failed.push((day, format!("{:#}", err)));
            }
        }
    }
    Ok(summary)
}

/// Process one day.
pub fn run_day(
    settings: &ConcatSettings,
    catalog: &PacketCatalog,
    day: UtcDay,
    force: bool,
) -> Result<DayOutcome> {
    if day >= catalog.today() {
        info!(day = %day, "Day is still being recorded, nothing to do");
        return Ok(DayOutcome::NotReady);
    }
    if !force && DayLedger::exists(&settings.output_path, day) {
        info!(day = %day, "Day already complete, skipping");
        return Ok(DayOutcome::AlreadyComplete);
    }

    let listing = catalog
        .list_ordered_packets(day)
        .with_context(|| format!("Failed to list packets for {}", day))?;
    let previous = previous_run(&settings.output_path, day);
    let resume = resume_point(&settings.output_path, day);

    let mut load_failures = 0usize;
    let packets = listing
        .packets
        .into_iter()
        .filter_map(|descriptor| load_packet(descriptor, &mut load_failures));
    let base = settings.reference.attributes();
    let assembler = match resume {
        Some(point) => ChunkAssembler::resume(settings.assembler, base, point),
        None => ChunkAssembler::new(settings.assembler, base),
    };

    let mut writer = ChunkWriter::new(&settings.output_path);
    let mut gaps = 0usize;
    let mut chunks = assemble(packets, assembler);
    for chunk in &mut chunks {
        let chunk = chunk.with_context(|| format!("Failed to assemble {}", day))?;
        if chunk.day != day {
            debug!(day = %day, chunk_day = %chunk.day, start = chunk.start_time, "Writing chunk into neighbouring day");
        }
        if chunk.gap_before.is_some() {
            gaps += 1;
        }
        writer
            .write(&chunk)
            .with_context(|| format!("Failed to write chunk for {}", day))?;
    }
    let end_point = chunks.resume_point();

    let written = writer.into_written();
    if written.is_empty() {
        bail!("No samples of {} could be assembled", day);
    }

    let removed_stale = previous.map_or(0, |ledger| {
        remove_stale_chunks(&ledger.chunk_paths(&settings.output_path), &written)
    });
    let rejected = listing.rejected.len() + load_failures;
    DayLedger::new(day, &written, gaps, rejected)
        .with_resume(end_point)
        .write(&settings.output_path, day)
        .with_context(|| format!("Failed to write ledger for {}", day))?;

    let samples = written.iter().map(|c| c.samples).sum();
    info!(
        day = %day,
        chunks = written.len(),
        samples,
        gaps,
        rejected,
        resumed = resume.is_some(),
        "Day written"
    );
    Ok(DayOutcome::Written(DaySummary {
        day,
        chunks: written,
        samples,
        gaps,
        rejected,
        removed_stale,
        resumed: resume.is_some(),
    }))
}

/// Ledger of an earlier run of `day`, if one can be read.
fn previous_run(root: &Path, day: UtcDay) -> Option<DayLedger> {
    match DayLedger::load(root, day) {
        Ok(ledger) => ledger,
        Err(err) => {
            warn!(day = %day, "Ignoring unreadable ledger of an earlier run: {:#}", err);
            None
        }
    }
}

/// Where the previous day's run stopped. Without its ledger the day starts a fresh run.
fn resume_point(root: &Path, day: UtcDay) -> Option<ResumePoint> {
    let ledger = match DayLedger::load(root, day.prev()) {
        Ok(Some(ledger)) => ledger,
        Ok(None) => {
            debug!(day = %day, "No ledger for the previous day, starting a new run");
            return None;
        }
        Err(err) => {
            warn!(day = %day, "Cannot resume from the previous day: {:#}", err);
            return None;
        }
    };
    ledger.resume
}

fn load_packet(descriptor: PacketDescriptor, failures: &mut usize) -> Option<Packet> {
    match descriptor.load_payload() {
        Ok(payload) => Some(Packet {
            start_time: descriptor.start_time,
            duration: descriptor.duration,
            payload,
            metadata: descriptor.metadata,
        }),
        Err(rejection) => {
            warn!(
                path = %descriptor.path.display(),
                kind = rejection.kind(),
                "Skipping packet: {}",
                rejection
            );
            *failures += 1;
            None
        }
    }
}

/// Delete chunk files an earlier run listed that this run did not produce.
///
/// Only listed files are touched: chunks in the same directory written by the
/// neighbouring day's run stay.
fn remove_stale_chunks(listed: &[PathBuf], written: &[WrittenChunk]) -> usize {
    let keep: HashSet<&PathBuf> = written.iter().map(|c| &c.path).collect();
    let mut removed = 0;
    for path in listed.iter().filter(|p| !keep.contains(p)) {
        match std::fs::remove_file(path) {
            Ok(()) => {
                warn!(path = %path.display(), "Removed stale chunk from an earlier run");
                removed += 1;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), "Cannot remove stale chunk: {}", err),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::CollectingAlertSink;
    use crate::config::{DascatConfig, PathsConfig};
    use dascat_test_utils::{indexed_matrix, packet_name, write_container_packet, write_reference, FixtureDir};

    // 2023-11-14T00:00:00Z
    const DAY_START: f64 = 1_699_920_000.0;

    fn settings(fixture: &FixtureDir) -> ConcatSettings {
        fixture.mkdir("local");
        fixture.mkdir("final");
        let reference = fixture.path().join("reference.h5");
        write_reference(&reference, 10.0, 4.0, (100, 2));
        let config = DascatConfig {
            paths: PathsConfig {
                local_path: fixture.path().join("local"),
                output_path: fixture.path().join("final"),
                reference_file: reference,
            },
            constants: Default::default(),
            source: Default::default(),
            logging: Default::default(),
        };
        config.resolve().unwrap()
    }

    fn day() -> UtcDay {
        UtcDay::of(DAY_START)
    }

    #[test]
    fn test_failed_day_is_reported_and_others_continue() {
        let fixture = FixtureDir::new();
        let settings = settings(&fixture);
        let good = fixture.mkdir("local/20231114");
        write_container_packet(&good, &packet_name(DAY_START + 60.0), &indexed_matrix(0, 100, 2), 10.0, 4.0);
        let bad = fixture.mkdir("local/20231113");
        std::fs::write(bad.join("das_SR_1699833600.h5"), b"junk").unwrap();

        let alerts = CollectingAlertSink::new();
        let summary = run(&settings, &RunOptions::default(), day().next(), &alerts).unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, day().prev());
        assert_eq!(alerts.alerts().len(), 1);
        assert_eq!(summary.written().count(), 1);
    }

    #[test]
    fn test_ledger_skips_completed_day() {
        let fixture = FixtureDir::new();
        let settings = settings(&fixture);
        let dir = fixture.mkdir("local/20231114");
        write_container_packet(&dir, &packet_name(DAY_START + 60.0), &indexed_matrix(0, 100, 2), 10.0, 4.0);
        let catalog = catalog_for(&settings, day().next());

        assert!(matches!(run_day(&settings, &catalog, day(), false).unwrap(), DayOutcome::Written(_)));
        assert_eq!(run_day(&settings, &catalog, day(), false).unwrap(), DayOutcome::AlreadyComplete);
        assert!(matches!(run_day(&settings, &catalog, day(), true).unwrap(), DayOutcome::Written(_)));
    }

    #[test]
    fn test_stale_chunks_removed_on_force() {
        let fixture = FixtureDir::new();
        let settings = settings(&fixture);
        let dir = fixture.mkdir("local/20231114");
        let moved = write_container_packet(&dir, &packet_name(DAY_START + 60.0), &indexed_matrix(0, 100, 2), 10.0, 4.0);
        let catalog = catalog_for(&settings, day().next());
        let DayOutcome::Written(first) = run_day(&settings, &catalog, day(), false).unwrap() else {
            panic!("day should be written");
        };
        // written by the previous day's run, not listed in this day's ledger
        let neighbour = fixture.write_file("final/2023/20231114/1699920000.0.h5", "tail");

        std::fs::remove_file(&moved).unwrap();
        write_container_packet(&dir, &packet_name(DAY_START + 70.0), &indexed_matrix(0, 100, 2), 10.0, 4.0);
        let DayOutcome::Written(second) = run_day(&settings, &catalog, day(), true).unwrap() else {
            panic!("day should be written");
        };

        assert_eq!(second.removed_stale, 1);
        assert!(!first.chunks[0].path.exists());
        assert!(second.chunks[0].path.exists());
        assert!(neighbour.exists());
    }

    #[test]
    fn test_next_day_resumes_from_ledger() {
        let fixture = FixtureDir::new();
        let settings = settings(&fixture);
        let prev = fixture.mkdir("local/20231113");
        // ends 2 s after midnight
        write_container_packet(&prev, &packet_name(DAY_START - 8.0), &indexed_matrix(0, 100, 2), 10.0, 4.0);
        let dir = fixture.mkdir("local/20231114");
        write_container_packet(&dir, &packet_name(DAY_START + 2.0), &indexed_matrix(100, 100, 2), 10.0, 4.0);
        let catalog = catalog_for(&settings, day().next());

        let DayOutcome::Written(before) = run_day(&settings, &catalog, day().prev(), false).unwrap() else {
            panic!("previous day should be written");
        };
        assert_eq!(before.samples, 100);
        assert!(!before.resumed);
        let ledger = DayLedger::load(&settings.output_path, day().prev()).unwrap().unwrap();
        assert!(ledger.resume.is_some());
        assert_eq!(ledger.chunks[1].file, "2023/20231114/1699920000.0.h5");

        let DayOutcome::Written(after) = run_day(&settings, &catalog, day(), false).unwrap() else {
            panic!("day should be written");
        };
        assert!(after.resumed);
        assert_eq!(after.gaps, 0);
        assert_eq!(after.chunks.len(), 1);
        assert!((after.chunks[0].start_time - (DAY_START + 2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_corrupt_payload_is_skipped_and_counted() {
        let fixture = FixtureDir::new();
        let settings = settings(&fixture);
        let dir = fixture.mkdir("local/20231114");
        write_container_packet(&dir, &packet_name(DAY_START + 60.0), &indexed_matrix(0, 100, 2), 10.0, 4.0);
        let second = write_container_packet(&dir, &packet_name(DAY_START + 70.0), &indexed_matrix(100, 100, 2), 10.0, 4.0);
        let catalog = catalog_for(&settings, day().next());
        let listing = catalog.list_ordered_packets(day()).unwrap();
        // header was valid at listing time; payload goes bad before assembly
        std::fs::write(&second, b"truncated").unwrap();

        let mut failures = 0;
        let loaded: Vec<_> = listing
            .packets
            .into_iter()
            .filter_map(|d| load_packet(d, &mut failures))
            .collect();
        assert_eq!(loaded.len(), 1);
        assert_eq!(failures, 1);
    }
}
