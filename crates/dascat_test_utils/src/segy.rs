use byteorder::{ByteOrder, LittleEndian};
use chrono::DateTime;
use chrono_tz::Tz;
use dascat_protocol::Matrix;
use std::path::{Path, PathBuf};

const FILE_HEADER_LEN: usize = 3600;
const TRACE_HEADER_LEN: usize = 240;
const SAMPLES_FIELD_OFFSET: usize = 114;

/// Encode a matrix as a little-endian SEG-Y file, one trace per row.
pub fn segy_bytes(matrix: &Matrix) -> Vec<u8> {
    let cols = matrix.cols();
    let trace_len = TRACE_HEADER_LEN + 4 * cols;
    let mut bytes = vec![0u8; FILE_HEADER_LEN + matrix.rows() * trace_len];
    for r in 0..matrix.rows() {
        let header = FILE_HEADER_LEN + r * trace_len;
        LittleEndian::write_i16(
            &mut bytes[header + SAMPLES_FIELD_OFFSET..header + SAMPLES_FIELD_OFFSET + 2],
            cols as i16,
        );
        let data = header + TRACE_HEADER_LEN;
        LittleEndian::write_f32_into(matrix.row(r), &mut bytes[data..data + 4 * cols]);
    }
    bytes
}

/// `YYYY-mm-ddTHH-MM-SS-ffffff.segy` for a UNIX timestamp shown on the wall clock of `tz`.
pub fn segy_file_name(ts: f64, tz: Tz) -> String {
    let micros = (ts * 1_000_000.0).round() as i64;
    let utc = DateTime::from_timestamp_micros(micros).expect("timestamp in range");
    let local = utc.with_timezone(&tz);
    format!("{}.segy", local.format("%Y-%m-%dT%H-%M-%S-%6f"))
}

pub fn write_segy_packet(dir: &Path, name: &str, matrix: &Matrix) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create packet dir");
    let path = dir.join(name);
    std::fs::write(&path, segy_bytes(matrix)).expect("Failed to write SEG-Y packet");
    path
}

/// Write `<dir>/<dirname>-info.json`.
pub fn write_segy_info(dir: &Path, sps: f64, dx: f64) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create packet dir");
    let name = dir
        .file_name()
        .and_then(|s| s.to_str())
        .expect("directory has a name");
    let path = dir.join(format!("{}-info.json", name));
    let info = serde_json::json!({ "prr": sps, "dx": dx });
    std::fs::write(&path, info.to_string()).expect("Failed to write info file");
    path
}
