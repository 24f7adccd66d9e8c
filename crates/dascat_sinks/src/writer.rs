//! HDF5 chunk writer with temp-file staging.

use crate::error::{SinkError, SinkResult};
use crate::naming::{chunk_path, temp_path_for};
use anyhow::{Context, Result};
use dascat_concat::FinishedChunk;
use dascat_protocol::container::write_container;
use dascat_protocol::{Attributes, Matrix, UtcDay};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A committed chunk file.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenChunk {
    pub path: PathBuf,
    pub start_time: f64,
    pub samples: usize,
    /// blake3 of the file contents, hex
    pub digest: String,
}

/// Single-file HDF5 sink.
///
/// Data is written to `.<name>.tmp` in the target directory and promoted with a
/// rename on [`commit`](Self::commit). Dropping the sink before a successful
/// commit removes the temp file.
pub struct Hdf5ChunkSink {
    final_path: PathBuf,
    /// Temp file path for staging
    temp_path: Option<PathBuf>,
    digest: Option<String>,
    committed: bool,
}

impl Hdf5ChunkSink {
    pub fn new(final_path: PathBuf) -> Result<Self> {
        if let Some(dir) = final_path.parent() {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create output directory: {}", dir.display())
            })?;
        }
        Ok(Self {
            final_path,
            temp_path: None,
            digest: None,
            committed: false,
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Stage the container in the temp file.
    pub fn write(&mut self, samples: &Matrix, attributes: &Attributes) -> Result<()> {
        let temp_path = temp_path_for(&self.final_path);
        debug!(
            "Staging chunk: {} (temp: {})",
            self.final_path.display(),
            temp_path.display()
        );
        self.temp_path = Some(temp_path.clone());

        write_container(&temp_path, samples, attributes)
            .with_context(|| format!("Failed to write chunk: {}", temp_path.display()))?;
        File::open(&temp_path)
            .and_then(|file| file.sync_all())
            .with_context(|| format!("Failed to sync chunk: {}", temp_path.display()))?;

        let bytes = std::fs::read(&temp_path)
            .with_context(|| format!("Failed to read back chunk: {}", temp_path.display()))?;
        self.digest = Some(blake3::hash(&bytes).to_hex().to_string());
        Ok(())
    }

    /// Promote the staged file. Returns the file digest.
    pub fn commit(&mut self) -> Result<String> {
        let temp_path = self
            .temp_path
            .take()
            .ok_or_else(|| anyhow::anyhow!("Chunk sink has nothing staged"))?;
        if let Err(err) = std::fs::rename(&temp_path, &self.final_path) {
            self.temp_path = Some(temp_path.clone());
            return Err(err).with_context(|| {
                format!(
                    "Failed to rename {} -> {}",
                    temp_path.display(),
                    self.final_path.display()
                )
            });
        }
        self.committed = true;
        self.digest
            .take()
            .ok_or_else(|| anyhow::anyhow!("Chunk digest missing after write"))
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl Drop for Hdf5ChunkSink {
    fn drop(&mut self) {
        // A staged file that was never promoted is discarded
        if let Some(temp_path) = self.temp_path.take() {
            if temp_path.exists() {
                let _ = std::fs::remove_file(&temp_path);
                warn!("Discarded uncommitted chunk: {}", temp_path.display());
            }
        }
    }
}

/// Writes finished chunks under an output root and remembers what was committed.
pub struct ChunkWriter {
    root: PathBuf,
    written: Vec<WrittenChunk>,
}

impl ChunkWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one chunk atomically. On failure nothing is left at the final path
    /// and earlier chunks are untouched.
    pub fn write(&mut self, chunk: &FinishedChunk) -> SinkResult<WrittenChunk> {
        if UtcDay::of(chunk.start_time) != chunk.day {
            return Err(SinkError::message(format!(
                "chunk starting at {} is labelled with day {}",
                chunk.start_time, chunk.day
            )));
        }

        let path = chunk_path(&self.root, chunk.start_time);
        let mut sink = Hdf5ChunkSink::new(path.clone())?;
        sink.write(&chunk.samples, &chunk.attributes)?;
        let digest = sink.commit()?;

        info!(
            path = %path.display(),
            samples = chunk.sample_count(),
            "Committed chunk"
        );
        let written = WrittenChunk {
            path,
            start_time: chunk.start_time,
            samples: chunk.sample_count(),
            digest,
        };
        self.written.push(written.clone());
        Ok(written)
    }

    pub fn written(&self) -> &[WrittenChunk] {
        &self.written
    }

    pub fn into_written(self) -> Vec<WrittenChunk> {
        self.written
    }
}
