//! Day completion ledger: `<root>/<YYYY>/<YYYYMMDD>/.complete.json`.
//!
//! Written last, after every chunk of the day is committed. A day without a
//! ledger is incomplete and gets redone on the next run.
//!
//! A day's run writes every row of its own input directory, including rows past
//! midnight, so a ledger may list chunks in the neighbouring day's directory.
//! The ledger also records where the run stopped; the next day's run resumes
//! from there.

use crate::error::SinkResult;
use crate::naming::{chunk_relative_path, day_output_dir, temp_path_for};
use crate::writer::WrittenChunk;
use anyhow::Context;
use dascat_concat::ResumePoint;
use dascat_protocol::UtcDay;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const LEDGER_FILE: &str = ".complete.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// `<YYYY>/<YYYYMMDD>/<name>` below the output root
    pub file: String,
    pub start_time: f64,
    pub samples: usize,
    pub blake3: String,
}

/// Contents are a pure function of the input packets, so reruns write the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayLedger {
    pub day: String,
    pub chunks: Vec<LedgerEntry>,
    pub gaps: usize,
    pub rejected_packets: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumePoint>,
}

impl DayLedger {
    pub fn new(day: UtcDay, written: &[WrittenChunk], gaps: usize, rejected_packets: usize) -> Self {
        let chunks = written
            .iter()
            .map(|chunk| LedgerEntry {
                file: chunk_relative_path(chunk.start_time),
                start_time: chunk.start_time,
                samples: chunk.samples,
                blake3: chunk.digest.clone(),
            })
            .collect();
        Self {
            day: day.dir_name(),
            chunks,
            gaps,
            rejected_packets,
            resume: None,
        }
    }

    pub fn with_resume(mut self, resume: Option<ResumePoint>) -> Self {
        self.resume = resume;
        self
    }

    /// Absolute paths of the listed chunks.
    pub fn chunk_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.chunks.iter().map(|entry| root.join(&entry.file)).collect()
    }

    pub fn path(root: &Path, day: UtcDay) -> PathBuf {
        day_output_dir(root, day).join(LEDGER_FILE)
    }

    pub fn exists(root: &Path, day: UtcDay) -> bool {
        Self::path(root, day).is_file()
    }

    pub fn load(root: &Path, day: UtcDay) -> SinkResult<Option<Self>> {
        let path = Self::path(root, day);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read ledger: {}", path.display()))?;
        let ledger = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ledger: {}", path.display()))?;
        Ok(Some(ledger))
    }

    pub fn total_samples(&self) -> usize {
        self.chunks.iter().map(|c| c.samples).sum()
    }

    /// Write the ledger atomically.
    pub fn write(&self, root: &Path, day: UtcDay) -> SinkResult<PathBuf> {
        let path = Self::path(root, day);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to encode ledger")?;
        let temp = temp_path_for(&path);
        std::fs::write(&temp, content)
            .with_context(|| format!("Failed to write ledger: {}", temp.display()))?;
        std::fs::rename(&temp, &path).with_context(|| {
            format!("Failed to rename {} -> {}", temp.display(), path.display())
        })?;
        info!(day = %day, chunks = self.chunks.len(), "Day complete");
        Ok(path)
    }
}
