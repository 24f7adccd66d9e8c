//! Packet descriptors: validated header information plus a lazy payload handle.

use crate::config::PacketFormat;
use crate::error::PacketRejection;
use crate::segy;
use dascat_protocol::container;
use dascat_protocol::{Attributes, Matrix};
use std::path::{Path, PathBuf};

/// One upstream packet file, described from its name and headers only.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketDescriptor {
    pub path: PathBuf,
    /// UNIX timestamp of the first sample, including any acquisition clock offset
    pub start_time: f64,
    /// Nominal packet length in seconds (redundancy included)
    pub duration: f64,
    pub sample_rate: f64,
    pub spatial_spacing: f64,
    /// (time samples, space channels)
    pub shape: (usize, usize),
    /// System specific attributes passed through to chunks
    pub metadata: Attributes,
    pub format: PacketFormat,
}

impl PacketDescriptor {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Read the sample matrix. The payload must still have the validated shape.
    pub fn load_payload(&self) -> Result<Matrix, PacketRejection> {
        let matrix = match self.format {
            PacketFormat::Container => load_container(&self.path)?,
            PacketFormat::Segy => segy::read_matrix(&self.path).map_err(PacketRejection::Corrupt)?,
        };
        if matrix.shape() != self.shape {
            return Err(PacketRejection::corrupt(format!(
                "payload shape {:?} differs from header shape {:?}",
                matrix.shape(),
                self.shape
            )));
        }
        Ok(matrix)
    }
}

fn load_container(path: &Path) -> Result<Matrix, PacketRejection> {
    container::read_container(path)
        .map(|(matrix, _)| matrix)
        .map_err(|e| PacketRejection::corrupt(e.to_string()))
}
