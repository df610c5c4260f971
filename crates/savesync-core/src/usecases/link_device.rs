//! Device-link use case
//!
//! [`LinkFlowController`] exchanges a short-lived link flow for a long-lived
//! credential. After a successful initiate call a background poller asks the
//! store for the flow status on a fixed interval until the flow completes,
//! expires or is cancelled. When the store hands out an in-game link code the
//! controller drives a short scripted handshake through [`IGameSession`].
//!
//! Only one poller runs at a time: [`LinkFlowController::start`] cancels the
//! previous one before initiating a new flow.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::domain::{Credential, LinkFlow, LinkState, SyncError};
use crate::ports::{
    ICloudStore, ICredentialStore, IGameSession, INotificationService, LinkStatus,
    LinkStatusKind, Notification,
};

/// What the presentation layer renders for the link flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSnapshot {
    pub state: LinkState,
    pub flow_id: Option<String>,
    pub approval_url: Option<String>,
    pub link_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Default for LinkSnapshot {
    fn default() -> Self {
        Self {
            state: LinkState::Idle,
            flow_id: None,
            approval_url: None,
            link_code: None,
            expires_at: None,
        }
    }
}

impl LinkSnapshot {
    fn of(flow: &LinkFlow) -> Self {
        Self {
            state: flow.state().clone(),
            flow_id: Some(flow.flow_id().to_string()),
            approval_url: Some(flow.approval_url().to_string()),
            link_code: flow.link_code().map(str::to_string),
            expires_at: Some(flow.expires_at()),
        }
    }
}

/// Timing and handshake settings
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub poll_interval: Duration,
    /// Server joined for the in-game handshake
    pub server_address: String,
    /// Wait before the single retry when the game session is not ready
    pub handshake_retry_delay: Duration,
    /// Pause between leaving the server and reporting completion
    pub settle_delay: Duration,
}

impl LinkSettings {
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            server_address: config.server_address.clone(),
            handshake_retry_delay: config.handshake_retry_delay(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// Outcome of handling one poll result
enum PollStep {
    Continue,
    Finished,
}

struct LinkContext {
    store: Arc<dyn ICloudStore>,
    credentials: Arc<dyn ICredentialStore>,
    game: Arc<dyn IGameSession>,
    notifier: Option<Arc<dyn INotificationService>>,
    settings: LinkSettings,
    snapshot_tx: watch::Sender<LinkSnapshot>,
}

/// Cancels its poller when dropped
struct Poller {
    cancel: DropGuard,
    handle: JoinHandle<()>,
}

/// Use case driving the device-link state machine
pub struct LinkFlowController {
    ctx: Arc<LinkContext>,
    poller: Mutex<Option<Poller>>,
}

impl LinkFlowController {
    pub fn new(
        store: Arc<dyn ICloudStore>,
        credentials: Arc<dyn ICredentialStore>,
        game: Arc<dyn IGameSession>,
        settings: LinkSettings,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(LinkSnapshot::default());
        Self {
            ctx: Arc::new(LinkContext {
                store,
                credentials,
                game,
                notifier: None,
                settings,
                snapshot_tx,
            }),
            poller: Mutex::new(None),
        }
    }

    /// Sends link notifications through `notifier`
    ///
    /// Must be called before the first [`Self::start`].
    pub fn with_notifier(mut self, notifier: Arc<dyn INotificationService>) -> Self {
        match Arc::get_mut(&mut self.ctx) {
            Some(ctx) => ctx.notifier = Some(notifier),
            None => warn!("Link controller already running, notifier not attached"),
        }
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkSnapshot> {
        self.ctx.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        self.ctx.snapshot_tx.borrow().clone()
    }

    /// Loads a persisted credential into the store client
    ///
    /// Returns true if one was found.
    pub fn restore_credential(&self) -> Result<bool, SyncError> {
        match self.ctx.credentials.load()? {
            Some(credential) => {
                self.ctx.store.set_credential(Some(credential));
                debug!("Restored stored credential");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Starts a new link flow, cancelling any flow in progress
    ///
    /// Returns the snapshot in `WaitingApproval`, carrying the approval URL.
    pub async fn start(&self) -> Result<LinkSnapshot, SyncError> {
        self.stop_poller().await;

        self.ctx.snapshot_tx.send_replace(LinkSnapshot {
            state: LinkState::Initiating,
            ..LinkSnapshot::default()
        });

        let initiation = match self.ctx.store.initiate_link().await {
            Ok(initiation) => initiation,
            Err(e) => {
                warn!(error = %e, "Link initiate failed");
                self.ctx.snapshot_tx.send_replace(LinkSnapshot {
                    state: LinkState::Failed(e.user_message()),
                    ..LinkSnapshot::default()
                });
                self.ctx
                    .notify(
                        Notification::error("Linking failed", e.user_message())
                            .with_details(e.details()),
                    )
                    .await;
                return Err(e);
            }
        };

        let flow = LinkFlow::new(
            initiation.flow_id,
            initiation.approval_url,
            initiation.expires_in,
            self.ctx.settings.poll_interval,
            Utc::now(),
        );
        info!(
            flow_id = %flow.flow_id(),
            max_polls = flow.max_poll_attempts(),
            expires_at = %flow.expires_at(),
            "Link flow waiting for approval"
        );
        let snapshot = LinkSnapshot::of(&flow);
        self.ctx.snapshot_tx.send_replace(snapshot.clone());

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_poller(Arc::clone(&self.ctx), flow, token.clone()));
        *self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Poller {
            cancel: token.drop_guard(),
            handle,
        });

        Ok(snapshot)
    }

    /// Cancels the running flow and returns to `Idle`
    pub async fn cancel(&self) {
        let was_running = self.stop_poller().await;
        let live = !self.snapshot().state.is_terminal();
        if was_running && live {
            info!("Link flow cancelled");
            self.ctx.snapshot_tx.send_replace(LinkSnapshot::default());
        }
    }

    /// Forgets the stored credential and the client's in-memory copy
    pub async fn unlink(&self) -> Result<(), SyncError> {
        self.stop_poller().await;
        self.ctx.credentials.clear()?;
        self.ctx.store.set_credential(None);
        self.ctx.snapshot_tx.send_replace(LinkSnapshot::default());
        info!("Device unlinked");
        Ok(())
    }

    /// Resolves once the flow is terminal or back to `Idle`
    pub async fn wait_until_settled(&self) -> LinkSnapshot {
        let mut rx = self.subscribe();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if snapshot.state.is_terminal() || snapshot.state == LinkState::Idle {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    /// Cancels the poller and waits for it to stop; returns true if one was running
    async fn stop_poller(&self) -> bool {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match poller {
            Some(Poller { cancel, handle }) => {
                cancel.disarm().cancel();
                let finished = handle.is_finished();
                if let Err(e) = handle.await {
                    warn!(error = %e, "Link poller ended abnormally");
                }
                !finished
            }
            None => false,
        }
    }
}

async fn run_poller(ctx: Arc<LinkContext>, mut flow: LinkFlow, token: CancellationToken) {
    let mut ticker = tokio::time::interval(ctx.settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(flow_id = %flow.flow_id(), "Link poller cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        let step = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(flow_id = %flow.flow_id(), "Link poller cancelled");
                return;
            }
            step = ctx.poll_once(&mut flow) => step,
        };

        if let PollStep::Finished = step {
            return;
        }
    }
}

impl LinkContext {
    async fn poll_once(&self, flow: &mut LinkFlow) -> PollStep {
        if !flow.register_poll() {
            info!(
                flow_id = %flow.flow_id(),
                attempts = flow.max_poll_attempts(),
                "Link poll budget exhausted"
            );
            return self.expire(flow).await;
        }

        match self.store.poll_link(flow.flow_id()).await {
            Ok(status) => self.handle_status(flow, status).await,
            Err(e) => {
                warn!(
                    flow_id = %flow.flow_id(),
                    attempt = flow.poll_attempts(),
                    error = %e,
                    "Link status poll failed, will retry"
                );
                PollStep::Continue
            }
        }
    }

    async fn handle_status(&self, flow: &mut LinkFlow, status: LinkStatus) -> PollStep {
        match status.status {
            LinkStatusKind::Pending => PollStep::Continue,
            LinkStatusKind::Expired => self.expire(flow).await,
            LinkStatusKind::Completed => {
                let credential = match status
                    .save_key
                    .as_deref()
                    .map(Credential::new)
                    .transpose()
                {
                    Ok(Some(credential)) => credential,
                    Ok(None) | Err(_) => {
                        return self
                            .fail(flow, "flow completed without a credential")
                            .await;
                    }
                };
                flow.set_credential(credential);

                if status.account_linked {
                    if flow.handshake_started() {
                        if let Err(e) = self.game.disconnect().await {
                            warn!(error = %e, "Failed to leave link server");
                        }
                        tokio::time::sleep(self.settings.settle_delay).await;
                    }
                    return self.complete(flow).await;
                }

                match status.link_code.as_deref().map(str::trim) {
                    Some(code) if !code.is_empty() => {
                        if flow.observe_link_code(code) {
                            self.handshake(flow, code).await;
                        }
                        PollStep::Continue
                    }
                    // credential issued, no in-game binding requested
                    _ if !flow.handshake_started() => self.complete(flow).await,
                    _ => PollStep::Continue,
                }
            }
        }
    }

    /// Joins the link server and sends the code as a chat command
    async fn handshake(&self, flow: &mut LinkFlow, code: &str) {
        self.advance(flow, LinkState::LinkingAccount);
        self.advance(flow, LinkState::JoiningServer);
        flow.mark_handshake_started();
        info!(server = %self.settings.server_address, "Joining link server");

        if let Err(e) = self.game.join_server(&self.settings.server_address).await {
            warn!(error = %e, "Failed to join link server, will retry on next poll");
            flow.forget_link_code();
            return;
        }

        if !self.game.is_session_ready().await {
            debug!(
                delay_ms = self.settings.handshake_retry_delay.as_millis() as u64,
                "Game session not ready, retrying once"
            );
            tokio::time::sleep(self.settings.handshake_retry_delay).await;
            if !self.game.is_session_ready().await {
                warn!("Game session still not ready, sending link command anyway");
            }
        }

        let command = format!("/link {}", code);
        if let Err(e) = self.game.send_command(&command).await {
            warn!(error = %e, "Failed to send link command");
        }
    }

    async fn complete(&self, flow: &mut LinkFlow) -> PollStep {
        let Some(credential) = flow.credential().cloned() else {
            return self.fail(flow, "flow completed without a credential").await;
        };
        if let Err(e) = self.credentials.save(&credential) {
            warn!(error = %e, "Failed to persist credential");
            return self.fail(flow, &e.user_message()).await;
        }
        self.store.set_credential(Some(credential));
        flow.clear_pending();
        self.advance(flow, LinkState::Completed);

        self.snapshot_tx.send_replace(LinkSnapshot {
            state: LinkState::Completed,
            ..LinkSnapshot::default()
        });
        info!(flow_id = %flow.flow_id(), "Device linked");
        self.notify(Notification::link("Account linked", "This device can now sync saves"))
            .await;
        PollStep::Finished
    }

    async fn expire(&self, flow: &mut LinkFlow) -> PollStep {
        self.advance(flow, LinkState::Expired);
        let err = SyncError::FlowExpired;
        self.notify(Notification::error("Link expired", err.user_message()))
            .await;
        PollStep::Finished
    }

    async fn fail(&self, flow: &mut LinkFlow, reason: &str) -> PollStep {
        warn!(flow_id = %flow.flow_id(), reason, "Link flow failed");
        self.advance(flow, LinkState::Failed(reason.to_string()));
        let err = SyncError::FlowFailed(reason.to_string());
        self.notify(
            Notification::error("Linking failed", err.user_message()).with_details(err.details()),
        )
        .await;
        PollStep::Finished
    }

    fn advance(&self, flow: &mut LinkFlow, to: LinkState) {
        let from = flow.state().clone();
        match flow.transition(to) {
            Ok(()) => {
                debug!(%from, to = %flow.state(), "Link state change");
                self.snapshot_tx.send_replace(LinkSnapshot::of(flow));
            }
            Err(e) => warn!(error = %e, "Ignoring link state change"),
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

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::{FlowId, SaveId, SaveItem};
    use crate::ports::{LinkInitiation, ProgressFn};

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct LinkStore {
        statuses: Mutex<VecDeque<Result<LinkStatus, SyncError>>>,
        initiations: AtomicUsize,
        polled: Mutex<Vec<String>>,
        credential: Mutex<Option<Credential>>,
        initiate_error: Option<SyncError>,
    }

    impl LinkStore {
        fn scripted(statuses: Vec<Result<LinkStatus, SyncError>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Default::default()
            }
        }

        fn poll_count(&self) -> usize {
            self.polled.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl ICloudStore for LinkStore {
        fn set_credential(&self, credential: Option<Credential>) {
            *self.credential.lock().unwrap() = credential;
        }

        fn has_credential(&self) -> bool {
            self.credential.lock().unwrap().is_some()
        }

        async fn list(&self) -> Result<Vec<SaveItem>, SyncError> {
            unreachable!()
        }

        async fn names(&self) -> Result<Vec<String>, SyncError> {
            unreachable!()
        }

        async fn delete(&self, _id: &SaveId) -> Result<(), SyncError> {
            unreachable!()
        }

        async fn upload(&self, _: &str, _: &Path, _: ProgressFn) -> Result<(), SyncError> {
            unreachable!()
        }

        async fn download(&self, _: &SaveId, _: &Path, _: ProgressFn) -> Result<PathBuf, SyncError> {
            unreachable!()
        }

        async fn initiate_link(&self) -> Result<LinkInitiation, SyncError> {
            if let Some(e) = &self.initiate_error {
                return Err(e.clone());
            }
            let n = self.initiations.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(LinkInitiation {
                flow_id: FlowId::new(format!("flow-{}", n)).unwrap(),
                approval_url: format!("https://example.test/approve/flow-{}", n),
                expires_in: Duration::from_secs(10),
            })
        }

        async fn poll_link(&self, flow_id: &FlowId) -> Result<LinkStatus, SyncError> {
            self.polled.lock().unwrap().push(flow_id.to_string());
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LinkStatus::pending()))
        }
    }

    #[derive(Default)]
    struct MemoryCredentials {
        stored: Mutex<Option<Credential>>,
    }

    impl ICredentialStore for MemoryCredentials {
        fn load(&self) -> Result<Option<Credential>, SyncError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        fn save(&self, credential: &Credential) -> Result<(), SyncError> {
            *self.stored.lock().unwrap() = Some(credential.clone());
            Ok(())
        }

        fn clear(&self) -> Result<(), SyncError> {
            *self.stored.lock().unwrap() = None;
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedGame {
        joined: Mutex<Vec<String>>,
        commands: Mutex<Vec<String>>,
        disconnects: AtomicUsize,
        readiness_checks: AtomicUsize,
        /// Readiness checks answered "not ready" before becoming ready
        not_ready_for: usize,
        /// Join attempts that fail before joining works
        failing_joins: usize,
    }

    #[async_trait::async_trait]
    impl IGameSession for ScriptedGame {
        async fn join_server(&self, address: &str) -> Result<(), SyncError> {
            let mut joined = self.joined.lock().unwrap();
            joined.push(address.to_string());
            if joined.len() <= self.failing_joins {
                return Err(SyncError::Transport("server unreachable".to_string()));
            }
            Ok(())
        }

        async fn is_session_ready(&self) -> bool {
            self.readiness_checks.fetch_add(1, Ordering::SeqCst) >= self.not_ready_for
        }

        async fn send_command(&self, command: &str) -> Result<(), SyncError> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), SyncError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn settings() -> LinkSettings {
        LinkSettings {
            poll_interval: Duration::from_secs(2),
            server_address: "link.example.test".to_string(),
            handshake_retry_delay: Duration::from_millis(1500),
            settle_delay: Duration::from_millis(1000),
        }
    }

    fn completed(key: Option<&str>, code: Option<&str>, linked: bool) -> Result<LinkStatus, SyncError> {
        Ok(LinkStatus {
            status: LinkStatusKind::Completed,
            save_key: key.map(str::to_string),
            link_code: code.map(str::to_string),
            account_linked: linked,
        })
    }

    struct Harness {
        controller: LinkFlowController,
        store: Arc<LinkStore>,
        credentials: Arc<MemoryCredentials>,
        game: Arc<ScriptedGame>,
    }

    fn harness(store: LinkStore, game: ScriptedGame) -> Harness {
        let store = Arc::new(store);
        let credentials = Arc::new(MemoryCredentials::default());
        let game = Arc::new(game);
        let controller = LinkFlowController::new(
            store.clone(),
            credentials.clone(),
            game.clone(),
            settings(),
        );
        Harness {
            controller,
            store,
            credentials,
            game,
        }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_start_surfaces_approval_url() {
        let h = harness(LinkStore::default(), ScriptedGame::default());
        let snapshot = h.controller.start().await.unwrap();
        assert_eq!(snapshot.state, LinkState::WaitingApproval);
        assert_eq!(
            snapshot.approval_url.as_deref(),
            Some("https://example.test/approve/flow-1")
        );
        assert_eq!(snapshot.flow_id.as_deref(), Some("flow-1"));
        h.controller.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_forever_expires_after_poll_budget() {
        let h = harness(LinkStore::default(), ScriptedGame::default());
        h.controller.start().await.unwrap();

        let settled = h.controller.wait_until_settled().await;
        assert_eq!(settled.state, LinkState::Expired);
        // 10s expiry at a 2s interval
        assert_eq!(h.store.poll_count(), 5);
        assert!(h.credentials.stored.lock().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_status_stops_polling() {
        let store = LinkStore::scripted(vec![
            Ok(LinkStatus::pending()),
            Ok(LinkStatus {
                status: LinkStatusKind::Expired,
                ..LinkStatus::pending()
            }),
        ]);
        let h = harness(store, ScriptedGame::default());
        h.controller.start().await.unwrap();

        assert_eq!(h.controller.wait_until_settled().await.state, LinkState::Expired);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.store.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_linked_completes_without_handshake() {
        let store = LinkStore::scripted(vec![completed(Some("key-123"), None, true)]);
        let h = harness(store, ScriptedGame::default());
        h.controller.start().await.unwrap();

        let settled = h.controller.wait_until_settled().await;
        assert_eq!(settled.state, LinkState::Completed);
        assert_eq!(settled.flow_id, None);
        assert_eq!(settled.link_code, None);

        let stored = h.credentials.stored.lock().unwrap().clone().unwrap();
        assert_eq!(stored.expose(), "key-123");
        assert!(h.store.has_credential());
        assert!(h.game.joined.lock().unwrap().is_empty());
        assert_eq!(h.game.disconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_code_runs_handshake_then_completes() {
        let store = LinkStore::scripted(vec![
            Ok(LinkStatus::pending()),
            completed(Some("key-123"), Some("ABC123"), false),
            completed(Some("key-123"), Some("ABC123"), false),
            completed(Some("key-123"), Some("ABC123"), true),
        ]);
        let h = harness(store, ScriptedGame::default());
        let mut rx = h.controller.subscribe();
        h.controller.start().await.unwrap();

        let mut seen = Vec::new();
        loop {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update().state.clone();
            seen.push(state.clone());
            if state.is_terminal() {
                break;
            }
        }

        assert!(seen.contains(&LinkState::JoiningServer));
        assert_eq!(seen.last(), Some(&LinkState::Completed));

        assert_eq!(
            h.game.joined.lock().unwrap().clone(),
            vec!["link.example.test".to_string()]
        );
        // a repeated code does not resend
        assert_eq!(
            h.game.commands.lock().unwrap().clone(),
            vec!["/link ABC123".to_string()]
        );
        assert_eq!(h.game.disconnects.load(Ordering::SeqCst), 1);
        assert!(h.credentials.stored.lock().unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_retries_once_when_session_not_ready() {
        let store = LinkStore::scripted(vec![
            completed(Some("key-123"), Some("XYZ"), false),
            completed(Some("key-123"), Some("XYZ"), true),
        ]);
        let game = ScriptedGame {
            not_ready_for: 1,
            ..Default::default()
        };
        let h = harness(store, game);
        h.controller.start().await.unwrap();

        assert_eq!(h.controller.wait_until_settled().await.state, LinkState::Completed);
        assert_eq!(h.game.readiness_checks.load(Ordering::SeqCst), 2);
        assert_eq!(
            h.game.commands.lock().unwrap().clone(),
            vec!["/link XYZ".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_join_is_retried_with_same_code() {
        let store = LinkStore::scripted(vec![
            completed(Some("key-123"), Some("XYZ"), false),
            completed(Some("key-123"), Some("XYZ"), false),
            completed(Some("key-123"), Some("XYZ"), true),
        ]);
        let game = ScriptedGame {
            failing_joins: 1,
            ..Default::default()
        };
        let h = harness(store, game);
        h.controller.start().await.unwrap();

        assert_eq!(h.controller.wait_until_settled().await.state, LinkState::Completed);
        assert_eq!(h.game.joined.lock().unwrap().len(), 2);
        assert_eq!(
            h.game.commands.lock().unwrap().clone(),
            vec!["/link XYZ".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_credential_fails() {
        let store = LinkStore::scripted(vec![completed(None, Some("ABC"), false)]);
        let h = harness(store, ScriptedGame::default());
        h.controller.start().await.unwrap();

        let settled = h.controller.wait_until_settled().await;
        assert!(matches!(settled.state, LinkState::Failed(_)));
        assert!(h.credentials.stored.lock().unwrap().is_none());
        assert!(!h.store.has_credential());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_with_credential_only_is_completed() {
        let store = LinkStore::scripted(vec![completed(Some("key-9"), None, false)]);
        let h = harness(store, ScriptedGame::default());
        h.controller.start().await.unwrap();

        assert_eq!(h.controller.wait_until_settled().await.state, LinkState::Completed);
        assert!(h.game.joined.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_are_tolerated() {
        let store = LinkStore::scripted(vec![
            Err(SyncError::Transport("connection reset".to_string())),
            Err(SyncError::HttpStatus {
                code: 502,
                body: "bad gateway".to_string(),
            }),
            completed(Some("key-1"), None, true),
        ]);
        let h = harness(store, ScriptedGame::default());
        h.controller.start().await.unwrap();

        assert_eq!(h.controller.wait_until_settled().await.state, LinkState::Completed);
        assert_eq!(h.store.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_returns_to_idle_and_stops_polling() {
        let h = harness(LinkStore::default(), ScriptedGame::default());
        h.controller.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        let polls = h.store.poll_count();
        assert_eq!(polls, 2);

        h.controller.cancel().await;
        assert_eq!(h.controller.snapshot().state, LinkState::Idle);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.store.poll_count(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_flow_cancels_previous_poller() {
        let h = harness(LinkStore::default(), ScriptedGame::default());
        h.controller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let second = h.controller.start().await.unwrap();
        assert_eq!(second.flow_id.as_deref(), Some("flow-2"));
        tokio::time::sleep(Duration::from_millis(4500)).await;
        h.controller.cancel().await;

        let polled = h.store.polled.lock().unwrap().clone();
        assert_eq!(polled, vec!["flow-1", "flow-2", "flow-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initiate_failure_is_reported() {
        let store = LinkStore {
            initiate_error: Some(SyncError::HttpStatus {
                code: 500,
                body: "{\"error\":\"down\"}".to_string(),
            }),
            ..Default::default()
        };
        let h = harness(store, ScriptedGame::default());

        assert!(h.controller.start().await.is_err());
        assert!(matches!(h.controller.snapshot().state, LinkState::Failed(_)));
    }

    #[tokio::test]
    async fn test_restore_and_unlink() {
        let h = harness(LinkStore::default(), ScriptedGame::default());
        assert!(!h.controller.restore_credential().unwrap());

        *h.credentials.stored.lock().unwrap() = Some(Credential::new("saved").unwrap());
        assert!(h.controller.restore_credential().unwrap());
        assert!(h.store.has_credential());

        h.controller.unlink().await.unwrap();
        assert!(!h.store.has_credential());
        assert!(h.credentials.stored.lock().unwrap().is_none());
    }
}
