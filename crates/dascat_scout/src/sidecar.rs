//! Sidecar metadata files.
//!
//! Container packets may ship a JSON file of extra attributes next to them
//! (`<stem>.json`, `<timestamp>.json`, or a directory wide `attrs.json`).
//! SEG-Y directories carry a single `<dir>-info.json` with the acquisition rate
//! and spacing.

use crate::error::PacketRejection;
use crate::naming;
use dascat_protocol::attrs::keys;
use dascat_protocol::{AttrValue, Attributes};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

const DIRECTORY_SIDECAR: &str = "attrs.json";

/// Map lower-case spellings used by some acquisition systems onto canonical keys.
pub fn canonical_key(key: &str) -> String {
    match key {
        "index" => keys::INDEX.to_string(),
        "origin" => keys::ORIGIN.to_string(),
        "spacing" => keys::SPACING.to_string(),
        "gauge_m" | "gauge_length" => keys::GAUGE_M.to_string(),
        "dx_down" => keys::DX_DOWN.to_string(),
        "prr_down" => keys::PRR_DOWN.to_string(),
        other => other.to_string(),
    }
}

fn read_object(path: &Path) -> Result<Map<String, Value>, PacketRejection> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PacketRejection::corrupt(format!("cannot read {}: {}", path.display(), e))
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        PacketRejection::corrupt(format!("invalid JSON in {}: {}", path.display(), e))
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(PacketRejection::corrupt(format!(
            "{} is not a JSON object",
            path.display()
        ))),
    }
}

fn to_attributes(map: Map<String, Value>, source: &Path) -> Attributes {
    let mut attrs = Attributes::new();
    for (key, value) in map {
        match serde_json::from_value::<AttrValue>(value) {
            Ok(attr) => {
                attrs.insert(canonical_key(&key), attr);
            }
            Err(_) => debug!(key = %key, file = %source.display(), "Skipping non-scalar sidecar value"),
        }
    }
    attrs
}

fn sidecar_candidates(packet_path: &Path) -> Vec<PathBuf> {
    let dir = packet_path.parent().unwrap_or_else(|| Path::new("."));
    let mut candidates = Vec::new();
    if let Some(stem) = packet_path.file_stem().and_then(|s| s.to_str()) {
        candidates.push(dir.join(format!("{}.json", stem)));
    }
    if let Some(token) = packet_path
        .file_name()
        .and_then(|s| s.to_str())
        .and_then(naming::container_time_token)
    {
        let by_time = dir.join(format!("{}.json", token));
        if !candidates.contains(&by_time) {
            candidates.push(by_time);
        }
    }
    candidates.push(dir.join(DIRECTORY_SIDECAR));
    candidates
}

/// Attributes from the first sidecar found for a container packet, if any.
pub fn load_sidecar(packet_path: &Path) -> Result<Option<Attributes>, PacketRejection> {
    for candidate in sidecar_candidates(packet_path) {
        if candidate.is_file() {
            debug!(sidecar = %candidate.display(), "Loading packet sidecar");
            let map = read_object(&candidate)?;
            return Ok(Some(to_attributes(map, &candidate)));
        }
    }
    Ok(None)
}

/// Acquisition clock offset in seconds, from `Origin[1]` (milliseconds).
pub fn time_offset(attrs: &Attributes) -> f64 {
    attrs
        .get(keys::ORIGIN)
        .and_then(AttrValue::as_f64_array)
        .and_then(|origin| origin.get(1).copied())
        .filter(|ms| ms.is_finite())
        .map(|ms| ms / 1000.0)
        .unwrap_or(0.0)
}

/// Contents of a SEG-Y `<dir>-info.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegyInfo {
    pub sps: f64,
    pub dx: f64,
    pub attributes: Attributes,
}

pub fn segy_info_path(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    dir.join(format!("{}-info.json", name))
}

pub fn load_segy_info(dir: &Path) -> Result<SegyInfo, PacketRejection> {
    let path = segy_info_path(dir);
    let mut map = read_object(&path)?;
    let mut take_number = |key: &str| -> Result<f64, PacketRejection> {
        map.remove(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                PacketRejection::corrupt(format!("{} has no numeric '{}'", path.display(), key))
            })
    };
    let sps = take_number("prr")?;
    let dx = take_number("dx")?;
    Ok(SegyInfo {
        sps,
        dx,
        attributes: to_attributes(map, &path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_sidecar_prefers_packet_specific_file() {
        let dir = tempdir().unwrap();
        let packet = dir.path().join("das_SR_1700000000.h5");
        std::fs::write(dir.path().join("attrs.json"), r#"{"gauge_m": 5.0}"#).unwrap();
        std::fs::write(
            dir.path().join("1700000000.json"),
            r#"{"index": [0, 31, 0, 999], "origin": [0.0, 250.0], "nested": {"a": 1}}"#,
        )
        .unwrap();

        let attrs = load_sidecar(&packet).unwrap().unwrap();
        assert_eq!(attrs[keys::INDEX], AttrValue::IntArray(vec![0, 31, 0, 999]));
        assert!(!attrs.contains_key("nested"));
        assert!(!attrs.contains_key(keys::GAUGE_M));
        assert_eq!(time_offset(&attrs), 0.25);
    }

    #[test]
    fn test_load_sidecar_falls_back_to_directory_file() {
        let dir = tempdir().unwrap();
        let packet = dir.path().join("das_SR_1700000000.h5");
        std::fs::write(dir.path().join("attrs.json"), r#"{"gauge_m": 5.0}"#).unwrap();

        let attrs = load_sidecar(&packet).unwrap().unwrap();
        assert_eq!(attrs[keys::GAUGE_M], AttrValue::Float(5.0));
        assert_eq!(time_offset(&attrs), 0.0);
    }

    #[test]
    fn test_load_sidecar_absent() {
        let dir = tempdir().unwrap();
        let packet = dir.path().join("das_SR_1700000000.h5");
        assert!(load_sidecar(&packet).unwrap().is_none());
    }

    #[test]
    fn test_load_segy_info() {
        let dir = tempdir().unwrap();
        let day = dir.path().join("20231114");
        std::fs::create_dir_all(&day).unwrap();
        std::fs::write(
            day.join("20231114-info.json"),
            r#"{"prr": 100, "dx": 4.08, "numTraces": 1000}"#,
        )
        .unwrap();

        let info = load_segy_info(&day).unwrap();
        assert_eq!(info.sps, 100.0);
        assert_eq!(info.dx, 4.08);
        assert_eq!(info.attributes["numTraces"], AttrValue::Int(1000));
    }

    #[test]
    fn test_load_segy_info_requires_rate() {
        let dir = tempdir().unwrap();
        let day = dir.path().join("20231114");
        std::fs::create_dir_all(&day).unwrap();
        std::fs::write(day.join("20231114-info.json"), r#"{"dx": 4.08}"#).unwrap();
        assert!(matches!(load_segy_info(&day), Err(PacketRejection::Corrupt(_))));
    }
}
