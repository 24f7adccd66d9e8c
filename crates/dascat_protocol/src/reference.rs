//! Reference configuration: the expected packet geometry, captured once at startup.

use crate::attrs::{keys, AttrValue, Attributes};
use crate::error::{ProtocolError, Result};
use serde::Serialize;
use std::fmt;

/// Expected rate, spacing and shape for every packet of a run.
///
/// Read-only after construction; passed explicitly to the catalog and assembler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    /// Temporal sample rate (samples per second)
    pub sps: f64,
    /// Spatial channel spacing (metres)
    pub dx: f64,
    /// Time samples per packet
    pub time_samples: usize,
    /// Space channels per packet
    pub space_samples: usize,
    pub down_factor_space: i64,
    pub down_factor_time: i64,
}

/// A single field that failed reference validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub field: &'static str,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mismatch: expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn require_f64(attrs: &Attributes, key: &str) -> Result<f64> {
    attrs
        .get(key)
        .ok_or_else(|| ProtocolError::MissingAttribute(key.to_string()))?
        .as_f64()
        .ok_or_else(|| ProtocolError::invalid_attribute(key, "expected a number"))
}

fn optional_factor(attrs: &Attributes, key: &str) -> Result<i64> {
    match attrs.get(key) {
        None => Ok(1),
        Some(value) => value
            .as_i64()
            .filter(|v| *v >= 1)
            .ok_or_else(|| ProtocolError::invalid_attribute(key, "expected a positive integer")),
    }
}

impl Reference {
    /// Build a reference from container attributes and the `data_down` shape.
    pub fn from_attributes(attrs: &Attributes, shape: (usize, usize)) -> Result<Self> {
        let sps = require_f64(attrs, keys::PRR_DOWN)?;
        let dx = require_f64(attrs, keys::DX_DOWN)?;
        if !(sps.is_finite() && sps > 0.0) {
            return Err(ProtocolError::invalid_attribute(
                keys::PRR_DOWN,
                format!("sample rate must be positive, got {}", sps),
            ));
        }
        if !(dx.is_finite() && dx > 0.0) {
            return Err(ProtocolError::invalid_attribute(
                keys::DX_DOWN,
                format!("spacing must be positive, got {}", dx),
            ));
        }
        if shape.0 == 0 || shape.1 == 0 {
            return Err(ProtocolError::shape(format!(
                "reference dataset is empty: {:?}",
                shape
            )));
        }
        Ok(Self {
            sps,
            dx,
            time_samples: shape.0,
            space_samples: shape.1,
            down_factor_space: optional_factor(attrs, keys::DOWN_FACTOR_SPACE)?,
            down_factor_time: optional_factor(attrs, keys::DOWN_FACTOR_TIME)?,
        })
    }

    /// Packet length implied by the reference shape.
    pub fn packet_seconds(&self) -> f64 {
        self.time_samples as f64 / self.sps
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.time_samples, self.space_samples)
    }

    /// Validate a packet's rate, spacing and shape. All mismatches are reported.
    pub fn check(&self, sps: f64, dx: f64, shape: (usize, usize)) -> std::result::Result<(), Vec<Mismatch>> {
        let mut mismatches = Vec::new();
        if !approx_eq(self.sps, sps) {
            mismatches.push(Mismatch {
                field: "sample rate",
                expected: self.sps.to_string(),
                actual: sps.to_string(),
            });
        }
        if !approx_eq(self.dx, dx) {
            mismatches.push(Mismatch {
                field: "spatial spacing",
                expected: self.dx.to_string(),
                actual: dx.to_string(),
            });
        }
        if self.shape() != shape {
            mismatches.push(Mismatch {
                field: "shape",
                expected: format!("{:?}", self.shape()),
                actual: format!("{:?}", shape),
            });
        }
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(mismatches)
        }
    }

    /// Attributes written unconditionally on every chunk.
    pub fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(keys::DX_DOWN.to_string(), AttrValue::Float(self.dx));
        attrs.insert(keys::PRR_DOWN.to_string(), AttrValue::Float(self.sps));
        attrs.insert(
            keys::DOWN_FACTOR_SPACE.to_string(),
            AttrValue::Int(self.down_factor_space),
        );
        attrs.insert(
            keys::DOWN_FACTOR_TIME.to_string(),
            AttrValue::Int(self.down_factor_time),
        );
        attrs
    }
}
