//! Local saves root scanning

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use savesync_core::domain::{SaveItem, SyncError};
use savesync_core::ports::ILocalSaves;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ArchiveError;

/// Recursive size of all regular files under `dir`
pub fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Lists the world directories directly under `root`, newest first
pub fn scan_saves(root: &Path) -> Result<Vec<SaveItem>, ArchiveError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(root = %root.display(), "Saves root does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path: PathBuf = entry.path();
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable save");
                continue;
            }
        };
        if !meta.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let modified: Option<DateTime<Utc>> = meta.modified().ok().map(DateTime::from);
        let created: Option<DateTime<Utc>> = meta.created().ok().map(DateTime::from);
        let size = dir_size(&path);
        items.push(SaveItem::local(path, name, size).with_timestamps(created, modified));
    }

    items.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    Ok(items)
}

/// `ILocalSaves` over the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsLocalSaves;

impl FsLocalSaves {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ILocalSaves for FsLocalSaves {
    async fn scan(&self, saves_root: &Path) -> Result<Vec<SaveItem>, SyncError> {
        let root = saves_root.to_path_buf();
        let items = tokio::task::spawn_blocking(move || scan_saves(&root))
            .await
            .map_err(ArchiveError::from)??;
        Ok(items)
    }
}
