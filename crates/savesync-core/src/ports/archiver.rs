//! Archive port (driven/secondary port)
//!
//! Packs a world directory into a temporary zip and unpacks a zip into a
//! directory. Implementations run the blocking zip work off the async
//! runtime's worker threads.

use std::path::{Path, PathBuf};

use crate::domain::SyncError;

/// Port trait for zip packing and unpacking
#[async_trait::async_trait]
pub trait IArchiver: Send + Sync {
    /// Zips every regular file under `source_dir` into a new temporary file
    ///
    /// Files whose name matches an entry of `exclude` (case-insensitive) are
    /// skipped. Entry names are relative to `source_dir` with `/` separators.
    /// The caller owns the returned file and must delete it.
    async fn pack(
        &self,
        source_dir: &Path,
        name_hint: &str,
        exclude: &[String],
    ) -> Result<PathBuf, SyncError>;

    /// Returns the first path segment shared by every entry, if any
    async fn detect_common_root(&self, zip_path: &Path) -> Result<Option<String>, SyncError>;

    /// Extracts `zip_path` into `dest_dir`, stripping `root/` when given
    ///
    /// Fails with [`SyncError::Archive`] without writing anything if any
    /// entry would land outside `dest_dir`. Returns the number of files written.
    async fn extract(
        &self,
        zip_path: &Path,
        root: Option<&str>,
        dest_dir: &Path,
    ) -> Result<usize, SyncError>;
}
