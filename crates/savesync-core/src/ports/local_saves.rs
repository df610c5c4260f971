//! Local saves port (driven/secondary port)

use std::path::Path;

use crate::domain::{SaveItem, SyncError};

/// Port trait for enumerating world directories on disk
#[async_trait::async_trait]
pub trait ILocalSaves: Send + Sync {
    /// Lists every direct subdirectory of `saves_root` as a local save
    ///
    /// Items carry the recursive size and the directory modification time,
    /// newest first. A missing root yields an empty list.
    async fn scan(&self, saves_root: &Path) -> Result<Vec<SaveItem>, SyncError>;
}
