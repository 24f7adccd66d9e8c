//! Dry-run view of a day: which packets would be used and how they join up.

use crate::config::ConcatSettings;
use anyhow::{Context, Result};
use dascat_concat::{classify, GapKind, PacketGap, Span};
use dascat_protocol::UtcDay;
use dascat_scout::{PacketCatalog, RejectedPacket};
use dascat_sinks::DayLedger;
use std::fmt;
use std::path::PathBuf;

/// One accepted packet and its relation to the packet before it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPacket {
    pub path: PathBuf,
    pub start_time: f64,
    pub duration: f64,
    /// `None` for the first packet of the day
    pub gap: Option<PacketGap>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayPlan {
    pub day: UtcDay,
    pub packets: Vec<PlannedPacket>,
    pub rejected: Vec<RejectedPacket>,
    /// A ledger already exists for this day
    pub complete: bool,
}

impl DayPlan {
    pub fn count(&self, kind: GapKind) -> usize {
        self.packets
            .iter()
            .filter(|p| p.gap.map_or(false, |g| g.kind == kind))
            .count()
    }
}

/// Classify every packet of `day` without reading payloads or writing output.
pub fn plan_day(settings: &ConcatSettings, catalog: &PacketCatalog, day: UtcDay) -> Result<DayPlan> {
    let listing = catalog
        .list_ordered_packets(day)
        .with_context(|| format!("Failed to list packets for {}", day))?;
    let sps = settings.reference.sps;

    let mut packets = Vec::with_capacity(listing.packets.len());
    let mut prev: Option<Span> = None;
    for descriptor in listing.packets {
        let span = Span::new(descriptor.start_time, descriptor.duration);
        let gap = prev.map(|p| classify(p, span, &settings.assembler.thresholds, sps));
        prev = Some(match prev {
            Some(p) if p.end() > span.end() => p,
            _ => span,
        });
        packets.push(PlannedPacket {
            path: descriptor.path,
            start_time: descriptor.start_time,
            duration: descriptor.duration,
            gap,
        });
    }

    Ok(DayPlan {
        day,
        packets,
        rejected: listing.rejected,
        complete: DayLedger::exists(&settings.output_path, day),
    })
}

impl fmt::Display for DayPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} packets, {} rejected{}",
            self.day,
            self.packets.len(),
            self.rejected.len(),
            if self.complete { " (complete)" } else { "" }
        )?;
        for packet in &self.packets {
            let name = packet
                .path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            match packet.gap {
                Some(gap) if gap.kind != GapKind::Contiguous => writeln!(
                    f,
                    "  {}  {} ({:+.3} s)",
                    name, gap.kind, gap.delta
                )?,
                _ => writeln!(f, "  {}", name)?,
            }
        }
        for rejected in &self.rejected {
            writeln!(f, "  rejected {}: {}", rejected.path.display(), rejected.rejection)?;
        }
        Ok(())
    }
}
