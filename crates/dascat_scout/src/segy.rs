//! SEG-Y packet decoding.
//!
//! Layout (little-endian):
//!
//! ```text
//! [3600 byte file header][trace 0][trace 1]...
//! trace = [240 byte trace header][n x f32]
//! ```
//!
//! Each trace is one time sample; its `n` values are the space channels. `n` is
//! the "samples in this trace" field of the first trace header (bytes 114..116).

use byteorder::{ByteOrder, LittleEndian};
use dascat_protocol::Matrix;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const FILE_HEADER_LEN: usize = 3600;
pub const TRACE_HEADER_LEN: usize = 240;
const SAMPLES_FIELD_OFFSET: usize = 114;

/// Shape of a SEG-Y packet: `(traces, samples_per_trace)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegyLayout {
    pub traces: usize,
    pub samples_per_trace: usize,
}

impl SegyLayout {
    fn trace_len(&self) -> usize {
        TRACE_HEADER_LEN + 4 * self.samples_per_trace
    }

    fn from_header(header: &[u8], file_len: u64) -> Result<Self, String> {
        let at = FILE_HEADER_LEN + SAMPLES_FIELD_OFFSET;
        if header.len() < at + 2 {
            return Err(format!("file too short for a SEG-Y header ({} bytes)", file_len));
        }
        let samples = LittleEndian::read_i16(&header[at..at + 2]);
        if samples <= 0 {
            return Err(format!("invalid samples-per-trace field: {}", samples));
        }
        let layout = SegyLayout {
            traces: 0,
            samples_per_trace: samples as usize,
        };
        let body = file_len.saturating_sub(FILE_HEADER_LEN as u64);
        let trace_len = layout.trace_len() as u64;
        if body % trace_len != 0 {
            return Err(format!(
                "trace data ({} bytes) is not a whole number of {} byte traces",
                body, trace_len
            ));
        }
        Ok(SegyLayout {
            traces: (body / trace_len) as usize,
            ..layout
        })
    }
}

/// Read only the headers needed to determine the packet shape.
pub fn read_layout(path: &Path) -> Result<SegyLayout, String> {
    let mut file = File::open(path).map_err(|e| format!("cannot open: {}", e))?;
    let file_len = file
        .metadata()
        .map_err(|e| format!("cannot stat: {}", e))?
        .len();
    let mut header = vec![0u8; FILE_HEADER_LEN + SAMPLES_FIELD_OFFSET + 2];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .map_err(|e| format!("cannot read header: {}", e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);
    SegyLayout::from_header(&header, file_len)
}

/// Decode the full trace matrix.
pub fn read_matrix(path: &Path) -> Result<Matrix, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read: {}", e))?;
    let layout = SegyLayout::from_header(&bytes, bytes.len() as u64)?;
    let mut data = vec![0f32; layout.traces * layout.samples_per_trace];
    for (trace, row) in data.chunks_mut(layout.samples_per_trace).enumerate() {
        let start = FILE_HEADER_LEN + trace * layout.trace_len() + TRACE_HEADER_LEN;
        let end = start + 4 * layout.samples_per_trace;
        LittleEndian::read_f32_into(&bytes[start..end], row);
    }
    Matrix::new(layout.traces, layout.samples_per_trace, data).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dascat_test_utils::segy_bytes;
    use tempfile::tempdir;

    #[test]
    fn test_layout_and_matrix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packet.segy");
        let matrix = Matrix::from_fn(12, 5, |r, c| r as f32 + c as f32 / 10.0);
        std::fs::write(&path, segy_bytes(&matrix)).unwrap();

        let layout = read_layout(&path).unwrap();
        assert_eq!(
            layout,
            SegyLayout {
                traces: 12,
                samples_per_trace: 5
            }
        );
        assert_eq!(read_matrix(&path).unwrap(), matrix);
    }

    #[test]
    fn test_truncated_trace_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packet.segy");
        let matrix = Matrix::from_fn(3, 4, |_, _| 1.0);
        let mut bytes = segy_bytes(&matrix);
        bytes.truncate(bytes.len() - 3);
        std::fs::write(&path, bytes).unwrap();

        let err = read_layout(&path).unwrap_err();
        assert!(err.contains("whole number"), "{}", err);
    }

    #[test]
    fn test_short_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packet.segy");
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        assert!(read_layout(&path).is_err());
    }
}
