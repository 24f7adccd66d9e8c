//! Relationship between consecutive packets.

use crate::error::{ConcatError, Result};
use serde::{Deserialize, Serialize};

/// Time extent of a packet: start timestamp and nominal duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: f64,
    pub duration: f64,
}

impl Span {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GapKind {
    /// `next` starts before `prev` ends; leading rows of `next` are dropped
    Overlap,
    /// Clean join within tolerance
    Contiguous,
    /// Short gap: the run is interrupted and annotated, never padded
    RecoverableGap,
    /// Data loss: the run ends and a new chunk starts at `next`
    UnrecoverableLoss,
}

impl GapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapKind::Overlap => "overlap",
            GapKind::Contiguous => "contiguous",
            GapKind::RecoverableGap => "recoverable_gap",
            GapKind::UnrecoverableLoss => "unrecoverable_loss",
        }
    }

    /// Whether this relationship ends the current chunk.
    pub fn breaks_run(&self) -> bool {
        matches!(self, GapKind::RecoverableGap | GapKind::UnrecoverableLoss)
    }
}

impl std::fmt::Display for GapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketGap {
    /// `next.start - prev.end` in seconds
    pub delta: f64,
    pub kind: GapKind,
    /// Leading rows of `next` to drop; non-zero only for `Overlap`
    pub trim_samples: usize,
}

/// `TIME_DIFF_THRESHOLD` and `DATA_LOSE_THRESHOLD`, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapThresholds {
    time_diff: f64,
    data_lose: f64,
}

impl GapThresholds {
    pub fn new(time_diff: f64, data_lose: f64) -> Result<Self> {
        if !(time_diff.is_finite() && data_lose.is_finite()) {
            return Err(ConcatError::InvalidThresholds(
                "thresholds must be finite".to_string(),
            ));
        }
        if time_diff < 0.0 {
            return Err(ConcatError::InvalidThresholds(format!(
                "time_diff_threshold must not be negative, got {}",
                time_diff
            )));
        }
        if data_lose <= time_diff {
            return Err(ConcatError::InvalidThresholds(format!(
                "data_lose_threshold ({}) must exceed time_diff_threshold ({})",
                data_lose, time_diff
            )));
        }
        Ok(Self {
            time_diff,
            data_lose,
        })
    }

    pub fn time_diff(&self) -> f64 {
        self.time_diff
    }

    pub fn data_lose(&self) -> f64 {
        self.data_lose
    }
}

/// Classify how `next` follows `prev` at sample rate `sps`.
///
/// Overlaps smaller than half a sample period count as contiguous.
pub fn classify(prev: Span, next: Span, thresholds: &GapThresholds, sps: f64) -> PacketGap {
    let delta = next.start - prev.end();
    let slack = 0.5 / sps;

    let (kind, trim_samples) = if delta < -slack {
        (GapKind::Overlap, (delta.abs() * sps).round() as usize)
    } else if delta < thresholds.time_diff {
        (GapKind::Contiguous, 0)
    } else if delta < thresholds.data_lose {
        (GapKind::RecoverableGap, 0)
    } else {
        (GapKind::UnrecoverableLoss, 0)
    };

    PacketGap {
        delta,
        kind,
        trim_samples,
    }
}
