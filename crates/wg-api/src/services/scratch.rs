//! Per-request scratch file cleanup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Removes every tracked file when dropped.
///
/// Runs on success, on error returns and on panics. If the request future is
/// dropped while a blocking pipeline task is still running, files that task
/// creates afterwards are not covered. Removal failures are logged and never
/// surfaced.
#[derive(Debug, Default)]
pub struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for removal. It does not need to exist yet.
    pub fn track(&mut self, path: impl AsRef<Path>) {
        self.paths.push(path.as_ref().to_path_buf());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => debug!(path = %path.display(), error = %e, "Failed to remove scratch file"),
            }
        }
    }
}
