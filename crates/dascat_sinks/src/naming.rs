//! Output paths. Names depend only on the chunk start time, so reruns land on
//! the same files.

use dascat_protocol::time::format_timestamp;
use dascat_protocol::UtcDay;
use std::path::{Path, PathBuf};

pub const CHUNK_EXTENSION: &str = "h5";

/// `<root>/<YYYY>/<YYYYMMDD>`
pub fn day_output_dir(root: &Path, day: UtcDay) -> PathBuf {
    root.join(day.year_name()).join(day.dir_name())
}

/// `1700000000.25` -> `1700000000.25.h5`
pub fn chunk_file_name(start_time: f64) -> String {
    format!("{}.{}", format_timestamp(start_time), CHUNK_EXTENSION)
}

/// Final location of the chunk starting at `start_time`.
pub fn chunk_path(root: &Path, start_time: f64) -> PathBuf {
    day_output_dir(root, UtcDay::of(start_time)).join(chunk_file_name(start_time))
}

/// `<YYYY>/<YYYYMMDD>/<name>` of the chunk starting at `start_time`, relative to the output root.
pub fn chunk_relative_path(start_time: f64) -> String {
    let day = UtcDay::of(start_time);
    format!("{}/{}/{}", day.year_name(), day.dir_name(), chunk_file_name(start_time))
}

/// Hidden staging file next to `final_path`: `.<name>.tmp`.
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{}.tmp", name))
}
