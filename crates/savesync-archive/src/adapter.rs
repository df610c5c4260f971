//! `IArchiver` implementation over the `zip` crate
//!
//! Zip work is synchronous, so every call moves to a blocking worker with
//! `spawn_blocking` and maps its result into `SyncError`.

use std::path::{Path, PathBuf};

use savesync_core::domain::SyncError;
use savesync_core::ports::IArchiver;
use tracing::info;

use crate::{pack, unpack, ArchiveError};

/// Archive adapter writing temporary zips under a scratch directory
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    scratch_dir: PathBuf,
}

impl ZipArchiver {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

async fn blocking<T, F>(f: F) -> Result<T, SyncError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(ArchiveError::from)?;
    Ok(result?)
}

#[async_trait::async_trait]
impl IArchiver for ZipArchiver {
    async fn pack(
        &self,
        source_dir: &Path,
        name_hint: &str,
        exclude: &[String],
    ) -> Result<PathBuf, SyncError> {
        let source_dir = source_dir.to_path_buf();
        let scratch_dir = self.scratch_dir.clone();
        let name_hint = name_hint.to_string();
        let exclude = exclude.to_vec();

        let packed = blocking(move || pack::pack_dir(&source_dir, &scratch_dir, &name_hint, &exclude)).await?;
        info!(
            zip = %packed.path.display(),
            files = packed.file_count,
            bytes = packed.source_bytes,
            "World packed"
        );
        Ok(packed.path)
    }

    async fn detect_common_root(&self, zip_path: &Path) -> Result<Option<String>, SyncError> {
        let zip_path = zip_path.to_path_buf();
        blocking(move || unpack::detect_common_root(&zip_path)).await
    }

    async fn extract(
        &self,
        zip_path: &Path,
        root: Option<&str>,
        dest_dir: &Path,
    ) -> Result<usize, SyncError> {
        let zip_path = zip_path.to_path_buf();
        let root = root.map(str::to_string);
        let dest_dir = dest_dir.to_path_buf();
        blocking(move || unpack::extract(&zip_path, root.as_deref(), &dest_dir)).await
    }
}
