//! Error types for packet discovery.

use dascat_protocol::{Mismatch, ProtocolError, UtcDay};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Day-level failures. These abort the affected day only.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No valid packets for {day} ({rejected} rejected)")]
    NoValidPackets { day: UtcDay, rejected: usize },

    #[error("Reference error: {0}")]
    Reference(#[from] ProtocolError),
}

impl CatalogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a single packet was left out. Packet-level problems never abort a day.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PacketRejection {
    /// Shape, rate or spacing differs from the reference
    #[error("validation failed: {}", describe_mismatches(.0))]
    Validation(Vec<Mismatch>),

    /// Unreadable file, unparsable name, missing attributes
    #[error("corrupt packet: {0}")]
    Corrupt(String),

    /// Same start time as an earlier packet
    #[error("duplicate start time, keeping {}", first.display())]
    Duplicate { first: PathBuf },
}

impl PacketRejection {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PacketRejection::Validation(_) => "validation",
            PacketRejection::Corrupt(_) => "corrupt",
            PacketRejection::Duplicate { .. } => "duplicate",
        }
    }
}

/// A rejected packet file and the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPacket {
    pub path: PathBuf,
    pub rejection: PacketRejection,
}
