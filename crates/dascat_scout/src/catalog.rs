//! Packet catalog: day discovery and ordered, validated packet listings.

use crate::config::{PacketFormat, SourceConfig};
use crate::error::{CatalogError, PacketRejection, RejectedPacket, Result};
use crate::naming;
use crate::packet::PacketDescriptor;
use crate::segy;
use crate::sidecar::{self, SegyInfo};
use dascat_protocol::attrs::{keys, merge_first_wins};
use dascat_protocol::time::parse_day_dir;
use dascat_protocol::{container, Attributes, Reference, UtcDay};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Start times closer than this are the same packet.
pub const DUPLICATE_TOLERANCE: f64 = 1e-6;

/// Validated packets of one day, ordered by start time, plus everything left out.
#[derive(Debug, Clone, PartialEq)]
pub struct DayListing {
    pub day: UtcDay,
    pub packets: Vec<PacketDescriptor>,
    pub rejected: Vec<RejectedPacket>,
}

impl DayListing {
    pub fn empty(day: UtcDay) -> Self {
        Self {
            day,
            packets: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

/// Read-only view over `LOCALPATH/YYYYMMDD/` packet directories.
#[derive(Debug, Clone)]
pub struct PacketCatalog {
    root: PathBuf,
    source: SourceConfig,
    reference: Reference,
    unit_size: f64,
    today: UtcDay,
}

impl PacketCatalog {
    /// `today` is the current UTC day; it and any later day are never opened.
    pub fn new(
        root: impl Into<PathBuf>,
        source: SourceConfig,
        reference: Reference,
        unit_size: f64,
        today: UtcDay,
    ) -> Self {
        Self {
            root: root.into(),
            source,
            reference,
            unit_size,
            today,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn today(&self) -> UtcDay {
        self.today
    }

    pub fn day_dir(&self, day: UtcDay) -> PathBuf {
        self.root.join(day.dir_name())
    }

    /// Completed days with a `YYYYMMDD` directory, oldest first.
    pub fn eligible_days(&self) -> Result<Vec<UtcDay>> {
        let entries =
            std::fs::read_dir(&self.root).map_err(|e| CatalogError::io(&self.root, e))?;
        let mut days = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::io(&self.root, e))?;
            if !entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(day) = name.to_str().and_then(parse_day_dir) else {
                continue;
            };
            if day >= self.today {
                debug!(day = %day, "Skipping day that is not complete yet");
                continue;
            }
            days.push(day);
        }
        days.sort();
        Ok(days)
    }

    /// All valid packets of `day`, ordered by start time.
    ///
    /// The current UTC day (or later) yields an empty listing without touching disk.
    pub fn list_ordered_packets(&self, day: UtcDay) -> Result<DayListing> {
        if day >= self.today {
            info!(day = %day, "Day is not complete yet, nothing to list");
            return Ok(DayListing::empty(day));
        }

        let dir = self.day_dir(day);
        let (packets, rejected) = self.scan(&dir)?;
        for rejection in &rejected {
            warn!(
                day = %day,
                path = %rejection.path.display(),
                kind = rejection.rejection.kind(),
                "Rejected packet: {}",
                rejection.rejection
            );
        }
        if packets.is_empty() {
            return Err(CatalogError::NoValidPackets {
                day,
                rejected: rejected.len(),
            });
        }
        info!(
            day = %day,
            packets = packets.len(),
            rejected = rejected.len(),
            "Listed day packets"
        );
        Ok(DayListing {
            day,
            packets,
            rejected,
        })
    }

    fn scan(&self, dir: &Path) -> Result<(Vec<PacketDescriptor>, Vec<RejectedPacket>)> {
        // Surface an unreadable day directory as a day failure before walking.
        std::fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))?;

        let mut paths = self.packet_files(dir);
        paths.sort();

        let mut infos: HashMap<PathBuf, std::result::Result<SegyInfo, PacketRejection>> =
            HashMap::new();
        let mut packets = Vec::new();
        let mut rejected = Vec::new();
        for path in paths {
            match self.describe(&path, &mut infos) {
                Ok(packet) => packets.push(packet),
                Err(rejection) => rejected.push(RejectedPacket { path, rejection }),
            }
        }

        packets.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let (packets, duplicates) = dedupe(packets);
        rejected.extend(duplicates);
        Ok((packets, rejected))
    }

    fn packet_files(&self, dir: &Path) -> Vec<PathBuf> {
        let extension = self.source.extension();
        WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(dir = %dir.display(), "Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
            })
            .map(DirEntry::into_path)
            .collect()
    }

    fn describe(
        &self,
        path: &Path,
        infos: &mut HashMap<PathBuf, std::result::Result<SegyInfo, PacketRejection>>,
    ) -> std::result::Result<PacketDescriptor, PacketRejection> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PacketRejection::corrupt("file name is not valid UTF-8"))?;

        let mut packet = match self.source.format {
            PacketFormat::Container => self.describe_container(path, file_name)?,
            PacketFormat::Segy => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let info = infos
                    .entry(dir.to_path_buf())
                    .or_insert_with(|| sidecar::load_segy_info(dir))
                    .clone()?;
                self.describe_segy(path, file_name, info)?
            }
        };

        self.reference
            .check(packet.sample_rate, packet.spatial_spacing, packet.shape)
            .map_err(PacketRejection::Validation)?;

        for key in keys::REFERENCE {
            packet.metadata.remove(key);
        }
        Ok(packet)
    }

    fn describe_container(
        &self,
        path: &Path,
        file_name: &str,
    ) -> std::result::Result<PacketDescriptor, PacketRejection> {
        let named = naming::container_timestamp(file_name).ok_or_else(|| {
            PacketRejection::corrupt(format!("no start time in file name '{}'", file_name))
        })?;
        let header =
            container::read_header(path).map_err(|e| PacketRejection::corrupt(e.to_string()))?;

        let mut metadata = header.attributes.clone();
        if let Some(extra) = sidecar::load_sidecar(path)? {
            merge_first_wins(&mut metadata, &extra);
        }

        let sample_rate = number(&metadata, keys::PRR_DOWN)?;
        let spatial_spacing = number(&metadata, keys::DX_DOWN)?;
        let start_time = named + sidecar::time_offset(&metadata);

        Ok(PacketDescriptor {
            path: path.to_path_buf(),
            start_time,
            duration: self.unit_size,
            sample_rate,
            spatial_spacing,
            shape: header.shape(),
            metadata,
            format: PacketFormat::Container,
        })
    }

    fn describe_segy(
        &self,
        path: &Path,
        file_name: &str,
        info: SegyInfo,
    ) -> std::result::Result<PacketDescriptor, PacketRejection> {
        let start_time = naming::segy_timestamp(file_name, self.source.timezone)
            .ok_or_else(|| {
                PacketRejection::corrupt(format!("no start time in file name '{}'", file_name))
            })?;
        let layout = segy::read_layout(path).map_err(PacketRejection::Corrupt)?;

        Ok(PacketDescriptor {
            path: path.to_path_buf(),
            start_time,
            duration: self.unit_size,
            sample_rate: info.sps,
            spatial_spacing: info.dx,
            shape: (layout.traces, layout.samples_per_trace),
            metadata: info.attributes,
            format: PacketFormat::Segy,
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map_or(false, |name| name.starts_with('.'))
}

fn number(attrs: &Attributes, key: &str) -> std::result::Result<f64, PacketRejection> {
    attrs
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| PacketRejection::corrupt(format!("missing numeric attribute '{}'", key)))
}

/// Drop packets whose start time repeats the previous kept packet.
///
/// Input must be sorted by start time; ties keep their original (path) order.
fn dedupe(packets: Vec<PacketDescriptor>) -> (Vec<PacketDescriptor>, Vec<RejectedPacket>) {
    let mut kept: Vec<PacketDescriptor> = Vec::with_capacity(packets.len());
    let mut duplicates = Vec::new();
    for packet in packets {
        match kept.last() {
            Some(last) if (packet.start_time - last.start_time).abs() < DUPLICATE_TOLERANCE => {
                duplicates.push(RejectedPacket {
                    path: packet.path,
                    rejection: PacketRejection::Duplicate {
                        first: last.path.clone(),
                    },
                });
            }
            _ => kept.push(packet),
        }
    }
    (kept, duplicates)
}
