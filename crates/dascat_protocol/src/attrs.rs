//! Container attributes.
//!
//! Attributes are kept in a `BTreeMap` so that serialization order is stable;
//! re-running the concatenator over unchanged input must produce byte-identical files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Attributes = BTreeMap<String, AttrValue>;

/// Attribute keys shared by packets and chunks.
pub mod keys {
    /// Primary dataset name
    pub const DATASET: &str = "data_down";

    // Written on every chunk
    pub const DX_DOWN: &str = "DX_down";
    pub const PRR_DOWN: &str = "PRR_down";
    pub const DOWN_FACTOR_SPACE: &str = "down_factor_space";
    pub const DOWN_FACTOR_TIME: &str = "down_factor_time";

    // System specific, passed through when present
    pub const GAUGE_M: &str = "Gauge_m";
    pub const INDEX: &str = "Index";
    pub const ORIGIN: &str = "Origin";
    pub const SPACING: &str = "Spacing";

    // Chunk provenance
    pub const GAP_BEFORE_S: &str = "gap_before_s";
    pub const GAP_KIND: &str = "gap_kind";
    pub const FLUSH_REASON: &str = "flush_reason";
    pub const PACKET_COUNT: &str = "packet_count";

    pub const REFERENCE: [&str; 4] = [DX_DOWN, PRR_DOWN, DOWN_FACTOR_SPACE, DOWN_FACTOR_TIME];
    pub const OPTIONAL: [&str; 4] = [GAUGE_M, INDEX, ORIGIN, SPACING];
}

/// A single attribute value.
///
/// Untagged so sidecar JSON (`{"Gauge_m": 10.2, "Index": [0, 511, 0, 9999]}`)
/// deserializes without type annotations. Variant order matters: integers are
/// tried before floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64_array(&self) -> Option<Vec<f64>> {
        match self {
            AttrValue::IntArray(v) => Some(v.iter().map(|x| *x as f64).collect()),
            AttrValue::FloatArray(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

/// Merge `incoming` into `target`, keeping values that are already present.
pub fn merge_first_wins(target: &mut Attributes, incoming: &Attributes) {
    for (key, value) in incoming {
        target.entry(key.clone()).or_insert_with(|| value.clone());
    }
}
