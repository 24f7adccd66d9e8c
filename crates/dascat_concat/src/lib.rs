//! dascat Concat - packet relationship classification and chunk assembly.
//!
//! Pure algorithms, no I/O. Packets go in already loaded and ordered by start
//! time; fixed-duration, day-aligned chunks come out.
//!
//! ```text
//! packets ──▶ classify(prev, next) ──▶ trim / flush ──▶ append rows ──▶ FinishedChunk
//!                                                      (day boundary first,
//!                                                       chunk size second)
//! ```
//!
//! A day's run ends with a [`ResumePoint`]; the next day's run starts from it so
//! that a run crossing midnight is split exactly once.

pub mod assembler;
pub mod classify;
pub mod error;

pub use assembler::{
    assemble, AssemblerSettings, ChunkAssembler, Chunks, FinishedChunk, FlushReason, GapNote,
    Packet, ResumePoint, Timeline,
};
pub use classify::{classify, GapKind, GapThresholds, PacketGap, Span};
pub use error::{ConcatError, Result};
