//! Property tests over backlog runs that cross midnight.

use dascat::config::{ConstantsConfig, PathsConfig};
use dascat::{run, CollectingAlertSink, ConcatSettings, DascatConfig, DayOutcome, RunOptions};
use dascat_protocol::container::read_container;
use dascat_protocol::UtcDay;
use dascat_test_utils::{indexed_matrix, packet_name, write_container_packet, write_reference, FixtureDir};
use proptest::prelude::*;
use std::collections::HashSet;

/// 2023-11-14T00:00:00Z
const MIDNIGHT: f64 = 1_699_920_000.0;
const SPS: f64 = 10.0;
const ROWS: usize = 100;

fn settings(fixture: &FixtureDir, concat_time: f64) -> ConcatSettings {
    fixture.mkdir("local");
    fixture.mkdir("final");
    let reference = fixture.path().join("reference.h5");
    write_reference(&reference, SPS, 4.0, (ROWS, 1));
    DascatConfig {
        paths: PathsConfig {
            local_path: fixture.path().join("local"),
            output_path: fixture.path().join("final"),
            reference_file: reference,
        },
        constants: ConstantsConfig {
            concat_time,
            ..Default::default()
        },
        source: Default::default(),
        logging: Default::default(),
    }
    .resolve()
    .unwrap()
}

/// First sample index of each packet. Packet `i + 1` starts `ROWS + step` samples
/// after packet `i`: negative steps overlap, small positive ones are contiguous
/// jitter, larger ones are recoverable gaps.
fn packet_starts(steps: &[i64]) -> Vec<usize> {
    let mut starts = vec![0usize];
    for step in steps {
        let last = *starts.last().unwrap() as i64;
        starts.push((last + ROWS as i64 + step) as usize);
    }
    starts
}

fn step() -> impl Strategy<Value = i64> {
    prop_oneof![4 => -20i64..=4, 1 => 10i64..=40]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Every input sample index is written exactly once across all day runs,
    /// whichever directory its packet was filed in.
    #[test]
    fn test_multi_day_run_writes_every_sample_once(
        lead in 0usize..1200,
        steps in prop::collection::vec(step(), 1..14),
        concat_time in prop::sample::select(vec![3.0, 25.0, 600.0]),
    ) {
        let fixture = FixtureDir::new();
        let settings = settings(&fixture, concat_time);

        let starts = packet_starts(&steps);
        let mut expected = HashSet::new();
        for &first in &starts {
            let start_time = MIDNIGHT + (first as f64 - lead as f64) / SPS;
            let dir = fixture.mkdir(&format!("local/{}", UtcDay::of(start_time).dir_name()));
            write_container_packet(&dir, &packet_name(start_time), &indexed_matrix(first, ROWS, 1), SPS, 4.0);
            expected.extend(first..first + ROWS);
        }

        let today = UtcDay::of(MIDNIGHT).next().next();
        let alerts = CollectingAlertSink::new();
        let summary = run(&settings, &RunOptions::default(), today, &alerts).unwrap();
        prop_assert!(summary.is_success(), "failures: {:?}", summary.failed);

        let mut values = Vec::new();
        let mut paths = HashSet::new();
        for (_, outcome) in &summary.days {
            let DayOutcome::Written(day) = outcome else {
                panic!("day not written: {:?}", outcome);
            };
            for chunk in &day.chunks {
                prop_assert!(paths.insert(chunk.path.clone()), "{} written twice", chunk.path.display());
                prop_assert!(chunk.samples <= settings.assembler.chunk_samples);
                let (matrix, _) = read_container(&chunk.path).unwrap();
                values.extend((0..matrix.rows()).map(|r| matrix.row(r)[0] as usize));
            }
        }

        let unique: HashSet<usize> = values.iter().copied().collect();
        prop_assert_eq!(unique.len(), values.len(), "duplicated samples");
        prop_assert_eq!(unique, expected);
        // days run oldest first, so the values come out in order
        prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
    }
}
