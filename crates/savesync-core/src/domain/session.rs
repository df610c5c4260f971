//! Transfer session entity
//!
//! A [`TransferSession`] tracks the byte counters of one upload or download.
//! It is owned by the orchestrator for the lifetime of one operation and
//! dropped when that operation finishes.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::newtypes::SaveId;
use super::progress::ProgressEstimator;

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Upload,
    Download,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// Byte counters and rate estimation for a single transfer
///
/// ## Invariants
///
/// - `transferred_bytes` never decreases
/// - when `total_bytes` is known, `transferred_bytes <= total_bytes`
#[derive(Debug, Clone)]
pub struct TransferSession {
    direction: Direction,
    item_id: Option<SaveId>,
    remote_name: String,
    artifact_path: Option<PathBuf>,
    total_bytes: Option<u64>,
    transferred_bytes: u64,
    started_at: Instant,
    estimator: ProgressEstimator,
}

impl TransferSession {
    /// Starts a new session with a fresh estimator
    pub fn new(direction: Direction, remote_name: impl Into<String>, now: Instant) -> Self {
        Self::with_estimator(direction, remote_name, ProgressEstimator::new(now), now)
    }

    /// Starts a new session using a pre-configured estimator, which is reset
    pub fn with_estimator(
        direction: Direction,
        remote_name: impl Into<String>,
        mut estimator: ProgressEstimator,
        now: Instant,
    ) -> Self {
        estimator.reset(now);
        Self {
            direction,
            item_id: None,
            remote_name: remote_name.into(),
            artifact_path: None,
            total_bytes: None,
            transferred_bytes: 0,
            started_at: now,
            estimator,
        }
    }

    pub fn with_item_id(mut self, id: SaveId) -> Self {
        self.item_id = Some(id);
        self
    }

    /// Records the local file produced or consumed by this transfer
    pub fn set_artifact(&mut self, path: impl Into<PathBuf>) {
        self.artifact_path = Some(path.into());
    }

    /// Applies a progress callback value observed at `now`
    ///
    /// A newly known total replaces an unknown one. Counters that would move
    /// backwards are ignored, and counters beyond a known total are clamped.
    pub fn record(&mut self, transferred: u64, total: Option<u64>, now: Instant) {
        if let Some(total) = total {
            self.total_bytes = Some(total.max(self.transferred_bytes));
        }

        let mut next = transferred.max(self.transferred_bytes);
        if let Some(total) = self.total_bytes {
            next = next.min(total);
        }
        self.transferred_bytes = next;
        self.estimator.sample_at(next, now);
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn item_id(&self) -> Option<&SaveId> {
        self.item_id.as_ref()
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    /// Fraction complete in `[0, 1]`, or `None` while the total is unknown
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((self.transferred_bytes as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    pub fn rate_bps(&self) -> f64 {
        self.estimator.rate_bps()
    }

    pub fn eta_secs(&self) -> Option<u64> {
        self.estimator
            .eta_secs(self.transferred_bytes, self.total_bytes)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}
