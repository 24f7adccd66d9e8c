//! Chunk writers for concatenated output.
//!
//! Sinks handle:
//! - Deterministic output naming (`<root>/<YYYY>/<YYYYMMDD>/<start>.h5`)
//! - Staging to a hidden temp file and atomic promotion by rename
//! - The per-day completion ledger
//!
//! A failed write removes its temp file and leaves every previously
//! committed chunk untouched.

mod error;
pub mod ledger;
pub mod naming;
pub mod writer;

pub use error::{SinkError, SinkResult};
pub use ledger::{DayLedger, LedgerEntry};
pub use naming::{chunk_file_name, chunk_path, chunk_relative_path, day_output_dir, temp_path_for};
pub use writer::{ChunkWriter, Hdf5ChunkSink, WrittenChunk};
