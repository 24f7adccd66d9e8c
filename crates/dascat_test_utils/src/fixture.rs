use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory tree, removed on drop.
pub struct FixtureDir {
    temp: TempDir,
}

impl FixtureDir {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Create `relative` (and parents) inside the fixture.
    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let dir = self.temp.path().join(relative);
        fs::create_dir_all(&dir).expect("Failed to create fixture dir");
        dir
    }

    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture dir");
        }
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }
}

impl Default for FixtureDir {
    fn default() -> Self {
        Self::new()
    }
}
