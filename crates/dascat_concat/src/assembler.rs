//! Chunk assembly.
//!
//! [`ChunkAssembler`] is a push-driven state machine: each packet is classified
//! against the previous one, trimmed or separated from it, and its rows are
//! appended to the open chunk buffer. A buffer is flushed when
//!
//! - the next row would belong to the following UTC day,
//! - it holds `chunk_samples` rows,
//! - a recoverable gap or unrecoverable loss interrupts the run,
//! - input ends.
//!
//! The day boundary is checked before the size boundary, so no chunk ever
//! spans two days. [`assemble`] wraps the state machine in a lazy iterator.
//!
//! Rows are placed on a timeline counted from the start of the current gap-free
//! run, so the day split of a run depends only on where the run began. A run
//! that continues past the end of one input directory is picked up again with
//! [`ChunkAssembler::resume`].

use crate::classify::{classify, GapKind, GapThresholds, Span};
use crate::error::{ConcatError, Result};
use dascat_protocol::attrs::{keys, merge_first_wins};
use dascat_protocol::time::samples_before;
use dascat_protocol::{AttrValue, Attributes, Matrix, UtcDay};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// A packet with its payload loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub start_time: f64,
    pub duration: f64,
    pub payload: Matrix,
    pub metadata: Attributes,
}

impl Packet {
    pub fn span(&self) -> Span {
        Span::new(self.start_time, self.duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushReason {
    ChunkFull,
    DayBoundary,
    Gap,
    EndOfInput,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::ChunkFull => "chunk_full",
            FlushReason::DayBoundary => "day_boundary",
            FlushReason::Gap => "gap",
            FlushReason::EndOfInput => "end_of_input",
        }
    }

    /// The next chunk continues this one's timeline.
    fn continues_timeline(&self) -> bool {
        matches!(self, FlushReason::ChunkFull | FlushReason::DayBoundary)
    }
}

/// The gap that preceded a chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapNote {
    pub kind: GapKind,
    /// Gap length in seconds
    pub seconds: f64,
}

/// An immutable, fully assembled chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedChunk {
    pub start_time: f64,
    pub day: UtcDay,
    pub samples: Matrix,
    /// Base attributes, merged packet metadata and provenance keys
    pub attributes: Attributes,
    pub gap_before: Option<GapNote>,
    pub flush_reason: FlushReason,
    pub packet_count: usize,
}

impl FinishedChunk {
    pub fn sample_count(&self) -> usize {
        self.samples.rows()
    }

    /// Timestamp one sample period after the last row.
    pub fn end_time(&self, sps: f64) -> f64 {
        self.start_time + self.samples.rows() as f64 / sps
    }
}

/// Assembly parameters derived from the reference and configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblerSettings {
    pub sps: f64,
    pub chunk_samples: usize,
    pub thresholds: GapThresholds,
}

impl AssemblerSettings {
    /// `concat_time` seconds per chunk at `sps` samples per second.
    pub fn new(sps: f64, concat_time: f64, thresholds: GapThresholds) -> Result<Self> {
        if !(sps.is_finite() && sps > 0.0) {
            return Err(ConcatError::InvalidChunkSize(format!(
                "sample rate must be positive, got {}",
                sps
            )));
        }
        let samples = (concat_time * sps).round();
        if !(samples.is_finite() && samples >= 1.0) {
            return Err(ConcatError::InvalidChunkSize(format!(
                "concat_time {} s holds no samples at {} sps",
                concat_time, sps
            )));
        }
        Ok(Self {
            sps,
            chunk_samples: samples as usize,
            thresholds,
        })
    }
}

/// Start of a gap-free run of samples and the number of samples before a given buffer.
///
/// Buffer start times are derived from the run start rather than from the previous
/// buffer, so rounding does not accumulate over a long run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub origin: f64,
    pub offset: usize,
}

impl Timeline {
    fn time(&self, sps: f64) -> f64 {
        self.origin + self.offset as f64 / sps
    }
}

/// Assembler state after the last packet of one input sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Latest-ending packet seen
    pub prev: Span,
    /// Position right after the last placed row, if the run was not broken
    pub timeline: Option<Timeline>,
}

struct ChunkBuffer {
    timeline: Timeline,
    start_time: f64,
    day: UtcDay,
    samples: Matrix,
    metadata: Attributes,
    gap_before: Option<GapNote>,
    packet_count: usize,
}

impl ChunkBuffer {
    fn new(
        timeline: Timeline,
        sps: f64,
        cols: usize,
        capacity: usize,
        gap_before: Option<GapNote>,
    ) -> Self {
        let start_time = timeline.time(sps);
        Self {
            timeline,
            start_time,
            day: UtcDay::of(start_time),
            samples: Matrix::with_capacity(cols, capacity),
            metadata: Attributes::new(),
            gap_before,
            packet_count: 0,
        }
    }

    fn len(&self) -> usize {
        self.samples.rows()
    }

    /// Timeline position right after the last row.
    fn next_timeline(&self) -> Timeline {
        Timeline {
            origin: self.timeline.origin,
            offset: self.timeline.offset + self.len(),
        }
    }

    /// Rows that still fit before the buffer's day ends. An empty buffer always takes one.
    fn day_room(&self, sps: f64) -> usize {
        let used = self.timeline.offset + self.len();
        let room = samples_before(self.timeline.origin, self.day.end_ts(), sps).saturating_sub(used);
        if self.len() == 0 {
            room.max(1)
        } else {
            room
        }
    }

    fn finish(self, reason: FlushReason, base: &Attributes) -> FinishedChunk {
        let mut attributes = base.clone();
        merge_first_wins(&mut attributes, &self.metadata);
        if let Some(gap) = &self.gap_before {
            attributes.insert(keys::GAP_BEFORE_S.to_string(), AttrValue::Float(gap.seconds));
            attributes.insert(keys::GAP_KIND.to_string(), AttrValue::from(gap.kind.as_str()));
        }
        attributes.insert(keys::FLUSH_REASON.to_string(), AttrValue::from(reason.as_str()));
        attributes.insert(
            keys::PACKET_COUNT.to_string(),
            AttrValue::Int(self.packet_count as i64),
        );

        FinishedChunk {
            start_time: self.start_time,
            day: self.day,
            samples: self.samples,
            attributes,
            gap_before: self.gap_before,
            flush_reason: reason,
            packet_count: self.packet_count,
        }
    }
}

/// Streaming chunk assembler. Feed packets in start-time order with [`push`](Self::push),
/// then call [`finish`](Self::finish).
pub struct ChunkAssembler {
    settings: AssemblerSettings,
    base: Attributes,
    buffer: Option<ChunkBuffer>,
    /// Latest-ending packet seen so far
    prev: Option<Span>,
    /// Annotation for the first chunk after a gap
    pending_gap: Option<GapNote>,
    /// Where the next buffer starts when the previous flush did not break the run
    next_timeline: Option<Timeline>,
}

impl ChunkAssembler {
    /// `base` attributes (reference parameters) are written on every chunk.
    pub fn new(settings: AssemblerSettings, base: Attributes) -> Self {
        Self {
            settings,
            base,
            buffer: None,
            prev: None,
            pending_gap: None,
            next_timeline: None,
        }
    }

    /// Continue a run left off by an earlier assembler.
    ///
    /// The first packet is classified against `point.prev`, so an overlap with
    /// the earlier input is trimmed and a contiguous packet keeps its timeline.
    pub fn resume(settings: AssemblerSettings, base: Attributes, point: ResumePoint) -> Self {
        Self {
            prev: Some(point.prev),
            next_timeline: point.timeline,
            ..Self::new(settings, base)
        }
    }

    pub fn settings(&self) -> &AssemblerSettings {
        &self.settings
    }

    /// Where a later assembler should pick up, or `None` before the first packet.
    pub fn resume_point(&self) -> Option<ResumePoint> {
        let prev = self.prev?;
        let timeline = match &self.buffer {
            Some(buffer) if buffer.len() > 0 => Some(buffer.next_timeline()),
            _ => self.next_timeline,
        };
        Some(ResumePoint { prev, timeline })
    }

    /// Append one packet, returning every chunk it completed.
    pub fn push(&mut self, packet: Packet) -> Result<Vec<FinishedChunk>> {
        let mut finished = Vec::new();
        let span = packet.span();
        let sps = self.settings.sps;

        let mut offset = 0;
        if let Some(prev) = self.prev {
            let gap = classify(prev, span, &self.settings.thresholds, sps);
            match gap.kind {
                GapKind::Overlap => {
                    debug!(
                        start = span.start,
                        delta = gap.delta,
                        trim = gap.trim_samples,
                        "Trimming overlapping samples"
                    );
                    offset = gap.trim_samples;
                }
                GapKind::Contiguous => {}
                GapKind::RecoverableGap | GapKind::UnrecoverableLoss => {
                    warn!(
                        prev_end = prev.end(),
                        next_start = span.start,
                        delta = gap.delta,
                        kind = %gap.kind,
                        "Packet gap, starting a new chunk"
                    );
                    self.flush(FlushReason::Gap, &mut finished);
                    self.next_timeline = None;
                    self.pending_gap = Some(GapNote {
                        kind: gap.kind,
                        seconds: gap.delta,
                    });
                }
            }
        }
        self.prev = match self.prev {
            Some(prev) if prev.end() > span.end() => Some(prev),
            _ => Some(span),
        };

        let rows = packet.payload.rows();
        if offset >= rows {
            debug!(start = span.start, "Packet fully overlapped, nothing appended");
            return Ok(finished);
        }

        let cols = packet.payload.cols();
        let chunk_samples = self.settings.chunk_samples;
        // Whether the open buffer already counted this packet
        let mut counted = false;
        while offset < rows {
            let timeline = self.next_timeline.take().unwrap_or(Timeline {
                origin: packet.start_time + offset as f64 / sps,
                offset: 0,
            });
            let pending = &mut self.pending_gap;
            let buffer = self.buffer.get_or_insert_with(|| {
                ChunkBuffer::new(timeline, sps, cols, chunk_samples, pending.take())
            });

            let day_room = buffer.day_room(sps);
            let chunk_room = chunk_samples.saturating_sub(buffer.len());
            let take = (rows - offset).min(day_room).min(chunk_room);

            buffer.samples.extend_rows(&packet.payload, offset, offset + take)?;
            if !counted {
                merge_first_wins(&mut buffer.metadata, &packet.metadata);
                buffer.packet_count += 1;
                counted = true;
            }
            offset += take;

            if take == day_room {
                self.flush(FlushReason::DayBoundary, &mut finished);
                counted = false;
            } else if take == chunk_room {
                self.flush(FlushReason::ChunkFull, &mut finished);
                counted = false;
            }
        }

        Ok(finished)
    }

    /// Flush whatever remains at end of input.
    pub fn finish(mut self) -> Option<FinishedChunk> {
        let mut finished = Vec::new();
        self.flush(FlushReason::EndOfInput, &mut finished);
        finished.pop()
    }

    fn flush(&mut self, reason: FlushReason, finished: &mut Vec<FinishedChunk>) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        if buffer.len() == 0 {
            return;
        }
        if reason.continues_timeline() {
            self.next_timeline = Some(buffer.next_timeline());
        }
        debug!(
            day = %buffer.day,
            start = buffer.start_time,
            samples = buffer.len(),
            reason = reason.as_str(),
            "Chunk complete"
        );
        finished.push(buffer.finish(reason, &self.base));
    }
}

/// Lazy iterator of finished chunks over an iterator of packets.
pub struct Chunks<I> {
    packets: I,
    assembler: Option<ChunkAssembler>,
    ready: VecDeque<FinishedChunk>,
    resume: Option<ResumePoint>,
}

impl<I> Chunks<I> {
    /// State to continue from once the input is exhausted. `None` while
    /// iteration is still running, after an error, or for empty input.
    pub fn resume_point(&self) -> Option<ResumePoint> {
        self.resume
    }
}

/// Assemble `packets` (ordered by start time) into chunks, one packet at a time.
pub fn assemble<I>(packets: I, assembler: ChunkAssembler) -> Chunks<I::IntoIter>
where
    I: IntoIterator<Item = Packet>,
{
    Chunks {
        packets: packets.into_iter(),
        assembler: Some(assembler),
        ready: VecDeque::new(),
        resume: None,
    }
}

impl<I> Iterator for Chunks<I>
where
    I: Iterator<Item = Packet>,
{
    type Item = Result<FinishedChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Some(Ok(chunk));
            }
            let assembler = self.assembler.as_mut()?;
            match self.packets.next() {
                Some(packet) => match assembler.push(packet) {
                    Ok(chunks) => self.ready.extend(chunks),
                    Err(e) => {
                        self.assembler = None;
                        return Some(Err(e));
                    }
                },
                None => {
                    let assembler = self.assembler.take()?;
                    self.resume = assembler.resume_point();
                    return assembler.finish().map(Ok);
                }
            }
        }
    }
}
