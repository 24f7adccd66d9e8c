use dascat_protocol::attrs::keys;
use dascat_protocol::container::write_container;
use dascat_protocol::{AttrValue, Attributes, Matrix};
use std::path::{Path, PathBuf};

/// Matrix whose every value is the global sample index of its row.
///
/// Packet `n` of a gap-free run built with `indexed_matrix(n * rows, rows, cols)`
/// makes it easy to check that each sample is written exactly once.
pub fn indexed_matrix(first_index: usize, rows: usize, cols: usize) -> Matrix {
    Matrix::from_fn(rows, cols, |r, _| (first_index + r) as f32)
}

/// Conventional container packet name for a start timestamp.
pub fn packet_name(ts: f64) -> String {
    format!("das_SR_{}.h5", ts)
}

fn rate_attributes(sps: f64, dx: f64) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(keys::PRR_DOWN.to_string(), AttrValue::Float(sps));
    attrs.insert(keys::DX_DOWN.to_string(), AttrValue::Float(dx));
    attrs
}

/// Write a container packet carrying `PRR_down` and `DX_down`.
pub fn write_container_packet(
    dir: &Path,
    name: &str,
    matrix: &Matrix,
    sps: f64,
    dx: f64,
) -> PathBuf {
    write_container_with(dir, name, matrix, &rate_attributes(sps, dx))
}

/// Write a container packet with arbitrary attributes.
pub fn write_container_with(
    dir: &Path,
    name: &str,
    matrix: &Matrix,
    attributes: &Attributes,
) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create packet dir");
    let path = dir.join(name);
    write_container(&path, matrix, attributes).expect("Failed to write packet");
    path
}

/// Write a reference container of the given shape.
pub fn write_reference(path: &Path, sps: f64, dx: f64, shape: (usize, usize)) -> PathBuf {
    let dir = path.parent().expect("reference path has a parent");
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .expect("reference path has a file name");
    let matrix = Matrix::from_fn(shape.0, shape.1, |_, _| 0.0);
    write_container_packet(dir, name, &matrix, sps, dx)
}
