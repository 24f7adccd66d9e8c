//! Configuration for a dascat run.
//!
//! ```toml
//! [paths]
//! local_path = "/data/das/local"        # LOCALPATH/YYYYMMDD/<packets>
//! output_path = "/nas/das/final"        # <output>/<YYYY>/<YYYYMMDD>/<chunks>
//! reference_file = "/data/das/reference.h5"
//!
//! [constants]
//! time_diff_threshold = 1.0
//! data_lose_threshold = 5.0
//! concat_time = 600.0
//! unit_size = 10.0                      # defaults to the reference packet length
//!
//! [source]
//! format = "container"                  # or "segy"
//! timezone = "Asia/Jerusalem"           # wall clock of SEG-Y file names, default UTC
//!
//! [logging]
//! dir = "/var/log/dascat"
//! filter = "dascat=info"
//! ```

use dascat_concat::{AssemblerSettings, ConcatError, GapThresholds};
use dascat_protocol::container::read_reference;
use dascat_protocol::{ProtocolError, Reference};
use dascat_scout::SourceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Relative tolerance between `unit_size` and the reference packet length.
const UNIT_SIZE_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Cannot use reference {}: {source}", path.display())]
    Reference {
        path: PathBuf,
        #[source]
        source: ProtocolError,
    },

    #[error("Invalid constants: {0}")]
    Constants(#[from] ConcatError),
}

impl ConfigError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DascatConfig {
    pub paths: PathsConfig,

    #[serde(default)]
    pub constants: ConstantsConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the `YYYYMMDD` packet directories
    pub local_path: PathBuf,
    /// Root of the `YYYY/YYYYMMDD` chunk directories
    pub output_path: PathBuf,
    /// Container file defining the expected rate, spacing and shape
    pub reference_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantsConfig {
    /// Gaps at or above this many seconds interrupt a chunk
    #[serde(default = "default_time_diff_threshold")]
    pub time_diff_threshold: f64,

    /// Gaps at or above this many seconds are unrecoverable data loss
    #[serde(default = "default_data_lose_threshold")]
    pub data_lose_threshold: f64,

    /// Chunk length in seconds
    #[serde(default = "default_concat_time")]
    pub concat_time: f64,

    /// Nominal packet length in seconds
    #[serde(default)]
    pub unit_size: Option<f64>,
}

fn default_time_diff_threshold() -> f64 {
    1.0
}

fn default_data_lose_threshold() -> f64 {
    5.0
}

fn default_concat_time() -> f64 {
    600.0
}

impl Default for ConstantsConfig {
    fn default() -> Self {
        Self {
            time_diff_threshold: default_time_diff_threshold(),
            data_lose_threshold: default_data_lose_threshold(),
            concat_time: default_concat_time(),
            unit_size: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file directory (defaults to `~/.dascat/logs`)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Default filter when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

/// Validated, immutable settings shared by every day of a run.
#[derive(Debug, Clone)]
pub struct ConcatSettings {
    pub local_path: PathBuf,
    pub output_path: PathBuf,
    pub reference: Reference,
    pub source: SourceConfig,
    pub unit_size: f64,
    pub assembler: AssemblerSettings,
}

impl DascatConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check paths and constants and read the reference file.
    pub fn resolve(&self) -> Result<ConcatSettings, ConfigError> {
        for (name, dir) in [
            ("local_path", &self.paths.local_path),
            ("output_path", &self.paths.output_path),
        ] {
            if !dir.is_dir() {
                return Err(ConfigError::invalid(format!(
                    "{} is not an accessible directory: {}",
                    name,
                    dir.display()
                )));
            }
        }

        let reference =
            read_reference(&self.paths.reference_file).map_err(|source| ConfigError::Reference {
                path: self.paths.reference_file.clone(),
                source,
            })?;

        let constants = &self.constants;
        let thresholds =
            GapThresholds::new(constants.time_diff_threshold, constants.data_lose_threshold)?;
        let assembler = AssemblerSettings::new(reference.sps, constants.concat_time, thresholds)?;

        let packet_seconds = reference.packet_seconds();
        let unit_size = constants.unit_size.unwrap_or(packet_seconds);
        if (unit_size - packet_seconds).abs() > UNIT_SIZE_TOLERANCE * packet_seconds {
            return Err(ConfigError::invalid(format!(
                "unit_size {} s does not match the reference packet length {} s ({} samples at {} sps)",
                unit_size, packet_seconds, reference.time_samples, reference.sps
            )));
        }

        Ok(ConcatSettings {
            local_path: self.paths.local_path.clone(),
            output_path: self.paths.output_path.clone(),
            reference,
            source: self.source.clone(),
            unit_size,
            assembler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dascat_scout::PacketFormat;
    use dascat_test_utils::{write_reference, FixtureDir};

    fn config_toml(fixture: &FixtureDir, extra: &str) -> String {
        format!(
            r#"
[paths]
local_path = "{}"
output_path = "{}"
reference_file = "{}"
{}
"#,
            fixture.path().join("local").display(),
            fixture.path().join("final").display(),
            fixture.path().join("reference.h5").display(),
            extra
        )
    }

    fn fixture() -> FixtureDir {
        let fixture = FixtureDir::new();
        fixture.mkdir("local");
        fixture.mkdir("final");
        write_reference(&fixture.path().join("reference.h5"), 100.0, 4.08, (1000, 8));
        fixture
    }

    #[test]
    fn test_defaults_apply() {
        let fixture = fixture();
        let config = DascatConfig::from_toml_str(&config_toml(&fixture, "")).unwrap();
        assert_eq!(config.constants, ConstantsConfig::default());
        assert_eq!(config.source.format, PacketFormat::Container);

        let settings = config.resolve().unwrap();
        assert_eq!(settings.unit_size, 10.0);
        assert_eq!(settings.assembler.chunk_samples, 60_000);
        assert_eq!(settings.reference.shape(), (1000, 8));
    }

    #[test]
    fn test_sections_parse() {
        let fixture = fixture();
        let config = DascatConfig::from_toml_str(&config_toml(
            &fixture,
            r#"
[constants]
time_diff_threshold = 3.0
data_lose_threshold = 5.0
concat_time = 20.0
unit_size = 10.0

[source]
format = "segy"
timezone = "Asia/Jerusalem"

[logging]
filter = "dascat=debug"
"#,
        ))
        .unwrap();
        assert_eq!(config.constants.time_diff_threshold, 3.0);
        assert_eq!(config.source.timezone.name(), "Asia/Jerusalem");
        assert_eq!(config.logging.filter.as_deref(), Some("dascat=debug"));
        assert_eq!(config.resolve().unwrap().assembler.chunk_samples, 2_000);
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let fixture = fixture();
        let config = DascatConfig::from_toml_str(&config_toml(
            &fixture,
            "[constants]\ntime_diff_threshold = 5.0\ndata_lose_threshold = 3.0\n",
        ))
        .unwrap();
        assert!(matches!(config.resolve(), Err(ConfigError::Constants(_))));
    }

    #[test]
    fn test_unit_size_must_match_reference() {
        let fixture = fixture();
        let config =
            DascatConfig::from_toml_str(&config_toml(&fixture, "[constants]\nunit_size = 12.0\n"))
                .unwrap();
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("unit_size"), "{}", err);
    }

    #[test]
    fn test_missing_directories_rejected() {
        let fixture = fixture();
        std::fs::remove_dir(fixture.path().join("final")).unwrap();
        let config = DascatConfig::from_toml_str(&config_toml(&fixture, "")).unwrap();
        assert!(matches!(config.resolve(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_reference_rejected() {
        let fixture = fixture();
        std::fs::remove_file(fixture.path().join("reference.h5")).unwrap();
        let config = DascatConfig::from_toml_str(&config_toml(&fixture, "")).unwrap();
        assert!(matches!(config.resolve(), Err(ConfigError::Reference { .. })));
    }

    #[test]
    fn test_missing_paths_section_is_parse_error() {
        assert!(matches!(
            DascatConfig::from_toml_str("[constants]\nconcat_time = 60.0\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
