//! End-to-end assembly scenarios on in-memory packets.

use dascat_concat::{
    assemble, AssemblerSettings, ChunkAssembler, FinishedChunk, FlushReason, GapKind,
    GapThresholds, Packet,
};
use dascat_protocol::Attributes;
use dascat_test_utils::indexed_matrix;

const SPS: f64 = 10.0;
// 2023-11-14T22:13:20Z, far from midnight
const T0: f64 = 1_700_000_000.0;

fn packet_at(offset_s: f64, duration_s: f64) -> Packet {
    let rows = (duration_s * SPS) as usize;
    Packet {
        start_time: T0 + offset_s,
        duration: duration_s,
        payload: indexed_matrix((offset_s * SPS) as usize, rows, 3),
        metadata: Attributes::new(),
    }
}

fn run(concat_time: f64, time_diff: f64, data_lose: f64, packets: Vec<Packet>) -> Vec<FinishedChunk> {
    let thresholds = GapThresholds::new(time_diff, data_lose).unwrap();
    let settings = AssemblerSettings::new(SPS, concat_time, thresholds).unwrap();
    assemble(packets, ChunkAssembler::new(settings, Attributes::new()))
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn column(chunk: &FinishedChunk) -> Vec<f32> {
    (0..chunk.samples.rows()).map(|r| chunk.samples.row(r)[0]).collect()
}

#[test]
fn scenario_a_contiguous_packets_form_one_buffer() {
    let chunks = run(
        600.0,
        3.0,
        5.0,
        vec![packet_at(0.0, 10.0), packet_at(10.0, 10.0), packet_at(20.0, 10.0)],
    );
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].sample_count(), 300);
    assert_eq!(chunks[0].start_time, T0);
    assert_eq!(chunks[0].packet_count, 3);
    assert!(chunks[0].gap_before.is_none());
}

#[test]
fn scenario_b_overlap_trims_leading_samples() {
    let chunks = run(600.0, 3.0, 5.0, vec![packet_at(0.0, 10.0), packet_at(8.0, 10.0)]);
    assert_eq!(chunks.len(), 1);
    // 2 s x SPS leading samples dropped from the second packet
    assert_eq!(chunks[0].sample_count(), 180);
    let values = column(&chunks[0]);
    assert_eq!(values, (0..180).map(|v| v as f32).collect::<Vec<_>>());
}

#[test]
fn scenario_c_loss_flushes_and_restarts() {
    let chunks = run(600.0, 3.0, 5.0, vec![packet_at(0.0, 10.0), packet_at(16.0, 10.0)]);
    assert_eq!(chunks.len(), 2);

    assert_eq!(chunks[0].sample_count(), 100);
    assert_eq!(chunks[0].flush_reason, FlushReason::Gap);

    assert_eq!(chunks[1].start_time, T0 + 16.0);
    assert_eq!(chunks[1].sample_count(), 100);
    let note = chunks[1].gap_before.unwrap();
    assert_eq!(note.kind, GapKind::UnrecoverableLoss);
    assert!((note.seconds - 6.0).abs() < 1e-9);
    // no padding: the new chunk starts with the first sample after the gap
    assert_eq!(column(&chunks[1])[0], 160.0);
}

#[test]
fn scenario_d_concat_time_splits_chunks() {
    let chunks = run(
        20.0,
        3.0,
        5.0,
        vec![
            packet_at(0.0, 10.0),
            packet_at(10.0, 10.0),
            packet_at(20.0, 10.0),
            packet_at(30.0, 10.0),
        ],
    );
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].sample_count(), 200);
    assert_eq!(chunks[0].flush_reason, FlushReason::ChunkFull);
    assert_eq!(chunks[1].sample_count(), 200);
    assert_eq!(chunks[1].start_time, T0 + 20.0);
    assert_eq!(chunks[1].flush_reason, FlushReason::ChunkFull);
}

#[test]
fn recoverable_gap_is_not_padded() {
    let chunks = run(600.0, 3.0, 5.0, vec![packet_at(0.0, 10.0), packet_at(14.0, 10.0)]);
    assert_eq!(chunks.len(), 2);
    let note = chunks[1].gap_before.unwrap();
    assert_eq!(note.kind, GapKind::RecoverableGap);
    let total: usize = chunks.iter().map(|c| c.sample_count()).sum();
    assert_eq!(total, 200);
}
