//! Cloud save store port (driven/secondary port)
//!
//! This module defines the interface to the remote save store and its
//! device-link endpoints. The HTTP implementation lives in `savesync-api`.
//!
//! ## Design Notes
//!
//! - Uses [`SyncError`] rather than `anyhow` because the orchestrator has to
//!   classify failures (auth, proxy limits, HTML error pages) for display.
//! - Progress callbacks are invoked on the I/O task with
//!   `(bytes_so_far, total)`. `total` is `None` when the size is unknown.
//! - Save-store calls fail with [`SyncError::NotAuthenticated`] before any
//!   network I/O when no credential has been set. The link calls are exempt.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Credential, FlowId, SaveId, SaveItem, SyncError};

/// Progress callback `(bytes_so_far, total_bytes)`
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

// ============================================================================
// Link flow DTOs
// ============================================================================

/// Result of starting a device-link flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInitiation {
    pub flow_id: FlowId,
    /// URL the user opens to approve this device
    pub approval_url: String,
    /// Lifetime of the flow on the server
    pub expires_in: Duration,
}

/// Server-side status of a link flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatusKind {
    Pending,
    Completed,
    Expired,
}

/// One poll result for a link flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub status: LinkStatusKind,
    /// Credential issued on completion
    pub save_key: Option<String>,
    /// Code to send in-game to bind the game account
    pub link_code: Option<String>,
    /// The game account is already bound to this credential
    pub account_linked: bool,
}

impl LinkStatus {
    pub fn pending() -> Self {
        Self {
            status: LinkStatusKind::Pending,
            save_key: None,
            link_code: None,
            account_linked: false,
        }
    }
}

// ============================================================================
// ICloudStore trait
// ============================================================================

/// Port trait for the remote save store
#[async_trait::async_trait]
pub trait ICloudStore: Send + Sync {
    /// Replaces the in-memory credential used by save-store calls
    fn set_credential(&self, credential: Option<Credential>);

    /// Returns true if a credential is currently set
    fn has_credential(&self) -> bool;

    /// Lists all saves held by the store
    async fn list(&self) -> Result<Vec<SaveItem>, SyncError>;

    /// Lists the world names already present remotely
    async fn names(&self) -> Result<Vec<String>, SyncError>;

    /// Deletes a stored save
    async fn delete(&self, id: &SaveId) -> Result<(), SyncError>;

    /// Streams `archive` to the store under `world_name`
    ///
    /// Progress counts archive bytes only, starting with `(0, size)`.
    async fn upload(
        &self,
        world_name: &str,
        archive: &Path,
        progress: ProgressFn,
    ) -> Result<(), SyncError>;

    /// Streams a stored save into `dest_dir`, returning the written file
    async fn download(
        &self,
        id: &SaveId,
        dest_dir: &Path,
        progress: ProgressFn,
    ) -> Result<PathBuf, SyncError>;

    /// Starts a device-link flow
    async fn initiate_link(&self) -> Result<LinkInitiation, SyncError>;

    /// Polls the status of a device-link flow
    async fn poll_link(&self, flow_id: &FlowId) -> Result<LinkStatus, SyncError>;
}
