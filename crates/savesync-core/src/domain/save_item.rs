//! Save item entity
//!
//! A [`SaveItem`] is an immutable snapshot of one save, either a local world
//! directory or an archive held by the remote store. Snapshots are replaced
//! wholesale on every refresh.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::SaveId;

/// Per-account storage cap enforced by the remote store (5 GiB)
pub const REMOTE_QUOTA_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Where a save lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SaveLocation {
    /// Archive stored remotely under this ID
    Remote(SaveId),
    /// World directory on the local filesystem
    Local(PathBuf),
}

/// Snapshot of a single save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveItem {
    pub location: SaveLocation,
    pub display_name: String,
    pub size_bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SaveItem {
    /// Creates a remote save snapshot
    pub fn remote(id: SaveId, display_name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            location: SaveLocation::Remote(id),
            display_name: display_name.into(),
            size_bytes,
            created_at: None,
            updated_at: None,
        }
    }

    /// Creates a local save snapshot
    pub fn local(path: PathBuf, display_name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            location: SaveLocation::Local(path),
            display_name: display_name.into(),
            size_bytes,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_timestamps(
        mut self,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    pub fn remote_id(&self) -> Option<&SaveId> {
        match &self.location {
            SaveLocation::Remote(id) => Some(id),
            SaveLocation::Local(_) => None,
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            SaveLocation::Local(path) => Some(path),
            SaveLocation::Remote(_) => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.location, SaveLocation::Remote(_))
    }
}

/// Used/remaining storage computed from a remote listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl QuotaUsage {
    /// Sums the sizes of the given remote items against the account cap
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a SaveItem>) -> Self {
        let used_bytes = items
            .into_iter()
            .filter(|item| item.is_remote())
            .fold(0u64, |acc, item| acc.saturating_add(item.size_bytes));
        Self {
            used_bytes,
            total_bytes: REMOTE_QUOTA_BYTES,
        }
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.used_bytes)
    }
}
