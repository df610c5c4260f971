//! SaveSync Archive - Zip handling and local save discovery
//!
//! Provides:
//! - Packing a world directory into a temporary zip
//! - Common-root detection and zip-slip safe extraction
//! - Scanning the local saves root
//!
//! ## Architecture
//!
//! This crate implements the `IArchiver` and `ILocalSaves` ports from
//! `savesync-core`. It is a driven (secondary) adapter; all zip and
//! filesystem work runs on blocking worker threads.
//!
//! ## Key Components
//!
//! - [`ZipArchiver`] - `IArchiver` implementation
//! - [`FsLocalSaves`] - `ILocalSaves` implementation
//! - [`ArchiveError`] - Error types for archive operations

pub mod adapter;
pub mod local;
pub mod pack;
pub mod unpack;

pub use adapter::ZipArchiver;
pub use local::FsLocalSaves;

use std::path::PathBuf;

use savesync_core::domain::SyncError;

/// Errors that can occur while packing, unpacking or scanning saves
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Filesystem read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container is malformed or could not be written
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Directory traversal failed
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// An entry would be written outside the destination directory
    #[error("Blocked unsafe entry: {0}")]
    UnsafeEntry(String),

    /// The directory to pack does not exist
    #[error("Source directory not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The blocking worker panicked or was cancelled
    #[error("Archive task failed: {0}")]
    TaskFailed(String),
}

impl From<ArchiveError> for SyncError {
    fn from(err: ArchiveError) -> Self {
        SyncError::Archive(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ArchiveError {
    fn from(err: tokio::task::JoinError) -> Self {
        ArchiveError::TaskFailed(err.to_string())
    }
}
