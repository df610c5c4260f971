//! Scoped cleanup of temporary artifacts
//!
//! A [`TempPathGuard`] deletes its file or directory when dropped, on every
//! exit path of the operation that created it. [`TempPathGuard::disarm`]
//! keeps the path, e.g. an extraction target that was filled successfully.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Deletes a path on drop unless disarmed
#[derive(Debug)]
pub struct TempPathGuard {
    path: PathBuf,
    armed: bool,
}

impl TempPathGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps the path on disk
    pub fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempPathGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let result = if self.path.is_dir() {
            std::fs::remove_dir_all(&self.path)
        } else {
            std::fs::remove_file(&self.path)
        };
        match result {
            Ok(()) => debug!(path = %self.path.display(), "Removed temporary artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove temporary artifact")
            }
        }
    }
}
