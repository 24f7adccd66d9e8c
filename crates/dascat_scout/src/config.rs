//! Source configuration for packet discovery

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// On-disk packet layout produced by the acquisition system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketFormat {
    /// `<prefix>_<unix-seconds>.h5` containers with a `data_down` dataset
    #[default]
    Container,
    /// `<YYYY-mm-ddTHH-MM-SS-ffffff>.segy` trace files plus a `<dir>-info.json`
    Segy,
}

impl PacketFormat {
    pub fn default_extension(&self) -> &'static str {
        match self {
            PacketFormat::Container => "h5",
            PacketFormat::Segy => "segy",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PacketFormat::Container => "container",
            PacketFormat::Segy => "segy",
        }
    }
}

/// `[source]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Packet layout
    #[serde(default)]
    pub format: PacketFormat,

    /// Packet file extension, without the dot (defaults per format)
    #[serde(default)]
    pub extension: Option<String>,

    /// IANA zone of the wall clock used in SEG-Y file names
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

fn default_timezone() -> Tz {
    Tz::UTC
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            format: PacketFormat::default(),
            extension: None,
            timezone: default_timezone(),
        }
    }
}

impl SourceConfig {
    pub fn extension(&self) -> &str {
        self.extension
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .unwrap_or_else(|| self.format.default_extension())
    }
}
