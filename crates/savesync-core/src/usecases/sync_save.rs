//! Save synchronization use case
//!
//! [`SyncOrchestrator`] sequences one operation at a time:
//!
//! ```text
//! upload:   Idle -> Packing -> Transferring -> Done
//! download: Idle -> Transferring -> Unpacking -> Done
//!                  (any active phase) -> Failed
//! ```
//!
//! The orchestrator owns the single [`TransferSession`] of the running
//! operation and publishes a [`ProgressSnapshot`] through a `watch` channel
//! that the presentation layer reads at its own pace. Temporary archives and
//! scratch directories are removed on every exit path.
//!
//! Uploads are gated on the remote name list: [`SyncOrchestrator::upload`]
//! only accepts a [`PendingUpload`], which is handed out directly when the
//! name is free or through [`OverwriteConfirmation::confirm`] when it is not.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::cleanup::TempPathGuard;
use crate::config::Config;
use crate::domain::{
    names_collide, sanitize_folder_name, unique_child_dir, Direction, ProgressEstimator, SaveId,
    SaveItem, SyncError, TransferSession,
};
use crate::ports::{
    IArchiver, ICloudStore, ILocalSaves, INotificationService, Notification, ProgressFn,
};

// ============================================================================
// Phase and snapshot
// ============================================================================

/// Phase of the current (or last) operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Packing,
    Transferring,
    Unpacking,
    Done,
    Failed,
}

impl SyncPhase {
    /// Packing, Transferring and Unpacking
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncPhase::Packing | SyncPhase::Transferring | SyncPhase::Unpacking
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed)
    }
}

/// What the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub phase: SyncPhase,
    pub direction: Option<Direction>,
    pub item_name: Option<String>,
    pub transferred_bytes: u64,
    pub total_bytes: Option<u64>,
    pub rate_bps: f64,
    pub eta_secs: Option<u64>,
    /// Short result or failure message once terminal
    pub message: Option<String>,
    /// Raw error text for a failed operation
    pub details: Option<String>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            direction: None,
            item_name: None,
            transferred_bytes: 0,
            total_bytes: None,
            rate_bps: 0.0,
            eta_secs: None,
            message: None,
            details: None,
        }
    }
}

impl ProgressSnapshot {
    /// Fraction complete, `None` while the total is unknown
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((self.transferred_bytes as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    fn apply_session(&mut self, session: &TransferSession) {
        self.transferred_bytes = session.transferred_bytes();
        self.total_bytes = session.total_bytes();
        self.rate_bps = session.rate_bps();
        self.eta_secs = session.eta_secs();
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Orchestrator settings derived from [`Config`]
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Directory holding one subdirectory per world
    pub saves_root: PathBuf,
    /// Parent of download scratch directories
    pub scratch_dir: PathBuf,
    /// File names skipped when packing
    pub exclude: Vec<String>,
    pub min_sample_interval: Duration,
    pub smoothing: f64,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            saves_root: config.saves.root.clone(),
            scratch_dir: config.scratch_dir(),
            exclude: config.saves.exclude.clone(),
            min_sample_interval: config.transfer.min_sample_interval(),
            smoothing: config.transfer.smoothing,
        }
    }
}

// ============================================================================
// Upload gate
// ============================================================================

/// An upload that may proceed
#[derive(Debug)]
pub struct PendingUpload {
    world_name: String,
    source_dir: PathBuf,
    replaces_existing: bool,
}

impl PendingUpload {
    pub fn world_name(&self) -> &str {
        &self.world_name
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// True if the user confirmed overwriting a remote save
    pub fn replaces_existing(&self) -> bool {
        self.replaces_existing
    }
}

/// An upload blocked on the user confirming an overwrite
///
/// Dropping it cancels the upload.
#[derive(Debug)]
pub struct OverwriteConfirmation {
    pending: PendingUpload,
    existing_name: String,
}

impl OverwriteConfirmation {
    /// Remote name the upload would replace
    pub fn existing_name(&self) -> &str {
        &self.existing_name
    }

    pub fn world_name(&self) -> &str {
        &self.pending.world_name
    }

    /// Confirms the overwrite
    pub fn confirm(self) -> PendingUpload {
        PendingUpload {
            replaces_existing: true,
            ..self.pending
        }
    }
}

/// Outcome of [`SyncOrchestrator::prepare_upload`]
#[derive(Debug)]
pub enum UploadGate {
    Proceed(PendingUpload),
    ConfirmOverwrite(OverwriteConfirmation),
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Releases the single-operation slot on drop
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Use case running pack/transfer/unpack operations one at a time
pub struct SyncOrchestrator {
    store: Arc<dyn ICloudStore>,
    archiver: Arc<dyn IArchiver>,
    local_saves: Arc<dyn ILocalSaves>,
    notifier: Option<Arc<dyn INotificationService>>,
    settings: OrchestratorSettings,
    busy: Arc<AtomicBool>,
    session: Arc<Mutex<Option<TransferSession>>>,
    snapshot_tx: Arc<watch::Sender<ProgressSnapshot>>,
    remote_saves: RwLock<Vec<SaveItem>>,
}

impl SyncOrchestrator {
    /// Creates a new orchestrator over the given adapters
    pub fn new(
        store: Arc<dyn ICloudStore>,
        archiver: Arc<dyn IArchiver>,
        local_saves: Arc<dyn ILocalSaves>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(ProgressSnapshot::default());
        Self {
            store,
            archiver,
            local_saves,
            notifier: None,
            settings,
            busy: Arc::new(AtomicBool::new(false)),
            session: Arc::new(Mutex::new(None)),
            snapshot_tx: Arc::new(snapshot_tx),
            remote_saves: RwLock::new(Vec::new()),
        }
    }

    /// Sends success/failure notifications through `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn INotificationService>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Handle for observing progress
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Returns true while an operation holds the slot
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// Fetches the remote list and replaces the cached snapshot
    pub async fn refresh_remote(&self) -> Result<Vec<SaveItem>, SyncError> {
        let items = self.store.list().await?;
        debug!(count = items.len(), "Refreshed remote saves");
        *self
            .remote_saves
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = items.clone();
        Ok(items)
    }

    /// Last remote list fetched by [`Self::refresh_remote`]
    pub fn remote_snapshot(&self) -> Vec<SaveItem> {
        self.remote_saves
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Scans the configured saves root
    pub async fn list_local(&self) -> Result<Vec<SaveItem>, SyncError> {
        self.local_saves.scan(&self.settings.saves_root).await
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Checks the remote name list before uploading a local save
    ///
    /// # Errors
    /// Fails if `world` is not a local save, if an operation is running, or
    /// if the name list cannot be fetched.
    pub async fn prepare_upload(&self, world: &SaveItem) -> Result<UploadGate, SyncError> {
        let source_dir = world.local_path().ok_or_else(|| {
            SyncError::Io(format!("'{}' is not a local save", world.display_name))
        })?;
        self.prepare_upload_dir(&world.display_name, source_dir)
            .await
    }

    /// Like [`Self::prepare_upload`] for an explicit directory
    pub async fn prepare_upload_dir(
        &self,
        world_name: &str,
        source_dir: &Path,
    ) -> Result<UploadGate, SyncError> {
        if self.is_busy() {
            return Err(SyncError::Busy);
        }
        if !source_dir.is_dir() {
            return Err(SyncError::Io(format!(
                "world directory not found: {}",
                source_dir.display()
            )));
        }

        let names = self.store.names().await?;
        let pending = PendingUpload {
            world_name: world_name.trim().to_string(),
            source_dir: source_dir.to_path_buf(),
            replaces_existing: false,
        };

        match names.into_iter().find(|n| names_collide(n, world_name)) {
            Some(existing_name) => {
                info!(world = %world_name, existing = %existing_name, "Remote save exists, confirmation required");
                Ok(UploadGate::ConfirmOverwrite(OverwriteConfirmation {
                    pending,
                    existing_name,
                }))
            }
            None => Ok(UploadGate::Proceed(pending)),
        }
    }

    /// Packs and uploads a world
    pub async fn upload(&self, pending: PendingUpload) -> Result<(), SyncError> {
        let _busy = self.try_acquire()?;
        self.begin(Direction::Upload, &pending.world_name, None);
        let result = self.run_upload(&pending).await;
        self.finish(Direction::Upload, &pending.world_name, &result)
            .await;
        result
    }

    async fn run_upload(&self, pending: &PendingUpload) -> Result<(), SyncError> {
        self.set_phase(SyncPhase::Packing);
        info!(world = %pending.world_name, source = %pending.source_dir.display(), "Packing world");

        let zip = self
            .archiver
            .pack(&pending.source_dir, &pending.world_name, &self.settings.exclude)
            .await?;
        let zip_guard = TempPathGuard::new(zip);
        self.with_session(|s| s.set_artifact(zip_guard.path()));

        self.set_phase(SyncPhase::Transferring);
        self.store
            .upload(&pending.world_name, zip_guard.path(), self.progress_callback())
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Download
    // ------------------------------------------------------------------

    /// Downloads a remote save and unpacks it into a new world directory
    ///
    /// Returns the created directory.
    pub async fn download(&self, item: &SaveItem) -> Result<PathBuf, SyncError> {
        let id = item.remote_id().cloned().ok_or_else(|| {
            SyncError::Io(format!("'{}' is not a remote save", item.display_name))
        })?;
        let _busy = self.try_acquire()?;
        self.begin(Direction::Download, &item.display_name, Some(id.clone()));
        let result = self.run_download(&id, &item.display_name).await;
        self.finish(Direction::Download, &item.display_name, &result)
            .await;
        result
    }

    async fn run_download(&self, id: &SaveId, world_name: &str) -> Result<PathBuf, SyncError> {
        self.set_phase(SyncPhase::Transferring);

        tokio::fs::create_dir_all(&self.settings.scratch_dir).await?;
        // Removed with its contents when this function returns
        let scratch = tempfile::Builder::new()
            .prefix("savesync-dl-")
            .tempdir_in(&self.settings.scratch_dir)?;

        let zip = self
            .store
            .download(id, scratch.path(), self.progress_callback())
            .await?;
        self.with_session(|s| s.set_artifact(&zip));

        self.set_phase(SyncPhase::Unpacking);
        let root = self.archiver.detect_common_root(&zip).await?;

        tokio::fs::create_dir_all(&self.settings.saves_root).await?;
        let target = unique_child_dir(&self.settings.saves_root, &sanitize_folder_name(world_name));
        tokio::fs::create_dir_all(&target).await?;
        let target_guard = TempPathGuard::new(target);

        let files = self
            .archiver
            .extract(&zip, root.as_deref(), target_guard.path())
            .await?;
        info!(
            world = %world_name,
            target = %target_guard.path().display(),
            root = ?root,
            files,
            "Unpacked downloaded save"
        );
        Ok(target_guard.disarm())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Deletes a remote save and drops it from the cached snapshot
    pub async fn delete(&self, id: &SaveId) -> Result<(), SyncError> {
        let _busy = self.try_acquire()?;
        match self.store.delete(id).await {
            Ok(()) => {
                info!(id = %id, "Deleted remote save");
                self.remote_saves
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .retain(|item| item.remote_id() != Some(id));
                self.notify(Notification::transfer("Deleted", id.to_string()))
                    .await;
                Ok(())
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Delete failed");
                self.notify(
                    Notification::error("Delete failed", e.user_message()).with_details(e.details()),
                )
                .await;
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Session plumbing
    // ------------------------------------------------------------------

    fn try_acquire(&self) -> Result<BusyGuard, SyncError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(Arc::clone(&self.busy)))
            .map_err(|_| SyncError::Busy)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<TransferSession>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_session(&self, f: impl FnOnce(&mut TransferSession)) {
        if let Some(session) = self.lock_session().as_mut() {
            f(session);
        }
    }

    fn begin(&self, direction: Direction, name: &str, id: Option<SaveId>) {
        let now = Instant::now();
        let estimator = ProgressEstimator::with_params(
            self.settings.min_sample_interval,
            self.settings.smoothing,
            now,
        );
        let mut session = TransferSession::with_estimator(direction, name, estimator, now);
        if let Some(id) = id {
            session = session.with_item_id(id);
        }
        *self.lock_session() = Some(session);

        self.snapshot_tx.send_replace(ProgressSnapshot {
            direction: Some(direction),
            item_name: Some(name.to_string()),
            ..ProgressSnapshot::default()
        });
        debug!(%direction, item = %name, "Operation started");
    }

    fn set_phase(&self, phase: SyncPhase) {
        debug!(?phase, "Phase change");
        self.snapshot_tx.send_modify(|snap| snap.phase = phase);
    }

    fn progress_callback(&self) -> ProgressFn {
        let session = Arc::clone(&self.session);
        let snapshot_tx = Arc::clone(&self.snapshot_tx);
        Arc::new(move |transferred, total| {
            let now = Instant::now();
            let mut guard = session
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(session) = guard.as_mut() {
                session.record(transferred, total, now);
                snapshot_tx.send_modify(|snap| snap.apply_session(session));
            }
        })
    }

    async fn finish<T>(&self, direction: Direction, name: &str, result: &Result<T, SyncError>) {
        let session = self.lock_session().take();
        let elapsed = session
            .as_ref()
            .map(|s| s.elapsed(Instant::now()))
            .unwrap_or_default();

        let verb = match direction {
            Direction::Upload => "Upload",
            Direction::Download => "Download",
        };

        match result {
            Ok(_) => {
                info!(
                    %direction,
                    item = %name,
                    bytes = session.as_ref().map(|s| s.transferred_bytes()).unwrap_or(0),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Operation complete"
                );
                let message = format!("{} complete", verb);
                self.snapshot_tx.send_modify(|snap| {
                    if let Some(s) = &session {
                        snap.apply_session(s);
                    }
                    snap.phase = SyncPhase::Done;
                    snap.rate_bps = 0.0;
                    snap.eta_secs = None;
                    snap.message = Some(message.clone());
                });
                self.notify(Notification::transfer(message, name)).await;
            }
            Err(e) => {
                warn!(%direction, item = %name, error = %e, "Operation failed");
                self.snapshot_tx.send_modify(|snap| {
                    snap.phase = SyncPhase::Failed;
                    snap.rate_bps = 0.0;
                    snap.eta_secs = None;
                    snap.message = Some(e.user_message());
                    snap.details = Some(e.details());
                });
                self.notify(
                    Notification::error(format!("{} failed", verb), e.user_message())
                        .with_details(e.details()),
                )
                .await;
            }
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&notification).await {
                warn!(error = %e, title = %notification.title, "Failed to deliver notification");
            }
        }
    }
}
