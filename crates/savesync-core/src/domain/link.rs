//! Device-link flow entity
//!
//! A [`LinkFlow`] exists from a successful initiate call until the flow
//! completes, expires, fails or is cancelled. State changes go through
//! [`LinkFlow::transition`] which rejects moves the state machine does not
//! allow.
//!
//! ```text
//! Idle -> Initiating -> WaitingApproval -> LinkingAccount -> JoiningServer -> Completed
//!                             |                  |                |
//!                             +------------------+----------------+--> Expired | Failed | Idle
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{Credential, FlowId};

/// State of the device-link state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum LinkState {
    Idle,
    Initiating,
    WaitingApproval,
    LinkingAccount,
    JoiningServer,
    Completed,
    Expired,
    Failed(String),
}

impl LinkState {
    /// Completed, Expired and Failed end a flow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LinkState::Completed | LinkState::Expired | LinkState::Failed(_)
        )
    }

    /// Returns true if the state machine allows moving from `self` to `to`
    pub fn can_transition_to(&self, to: &LinkState) -> bool {
        use LinkState::*;
        match (self, to) {
            // cancellation from any live state
            (from, Idle) => !from.is_terminal(),
            (Idle, Initiating) => true,
            (Initiating, WaitingApproval) => true,
            (WaitingApproval, LinkingAccount) => true,
            (LinkingAccount, JoiningServer) => true,
            // a fresh link code restarts the handshake
            (JoiningServer, LinkingAccount) => true,
            (WaitingApproval | LinkingAccount | JoiningServer, Completed) => true,
            (from, Expired | Failed(_)) => !from.is_terminal(),
            _ => false,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LinkState::Idle => "Idle",
            LinkState::Initiating => "Initiating",
            LinkState::WaitingApproval => "WaitingApproval",
            LinkState::LinkingAccount => "LinkingAccount",
            LinkState::JoiningServer => "JoiningServer",
            LinkState::Completed => "Completed",
            LinkState::Expired => "Expired",
            LinkState::Failed(_) => "Failed",
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Failed(reason) => write!(f, "Failed ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// One device-link attempt
#[derive(Debug, Clone)]
pub struct LinkFlow {
    flow_id: FlowId,
    state: LinkState,
    approval_url: String,
    expires_at: DateTime<Utc>,
    max_poll_attempts: u32,
    poll_attempts: u32,
    link_code: Option<String>,
    handshake_started: bool,
    credential: Option<Credential>,
}

impl LinkFlow {
    /// Creates a flow that has just been initiated and awaits approval
    ///
    /// The poll budget is `expires_in / poll_interval`, at least one attempt.
    pub fn new(
        flow_id: FlowId,
        approval_url: impl Into<String>,
        expires_in: Duration,
        poll_interval: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let interval_ms = poll_interval.as_millis().max(1);
        let attempts = (expires_in.as_millis() / interval_ms).max(1);
        let max_poll_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        let expires_at = now
            + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            flow_id,
            state: LinkState::WaitingApproval,
            approval_url: approval_url.into(),
            expires_at,
            max_poll_attempts,
            poll_attempts: 0,
            link_code: None,
            handshake_started: false,
            credential: None,
        }
    }

    /// Moves to `to` if allowed
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidState`] for a disallowed transition
    pub fn transition(&mut self, to: LinkState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(&to) {
            return Err(DomainError::InvalidState {
                from: self.state.label().to_string(),
                to: to.label().to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Counts one poll and returns true while the budget is not exhausted
    pub fn register_poll(&mut self) -> bool {
        self.poll_attempts = self.poll_attempts.saturating_add(1);
        self.poll_attempts <= self.max_poll_attempts
    }

    /// Records a link code; returns true if it differs from the last one seen
    pub fn observe_link_code(&mut self, code: &str) -> bool {
        if self.link_code.as_deref() == Some(code) {
            return false;
        }
        self.link_code = Some(code.to_string());
        true
    }

    /// Forgets the last link code so the same code triggers a new handshake
    pub fn forget_link_code(&mut self) {
        self.link_code = None;
    }

    pub fn mark_handshake_started(&mut self) {
        self.handshake_started = true;
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    /// Drops transient link data once the flow has finished
    pub fn clear_pending(&mut self) {
        self.link_code = None;
    }

    pub fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn approval_url(&self) -> &str {
        &self.approval_url
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn max_poll_attempts(&self) -> u32 {
        self.max_poll_attempts
    }

    pub fn poll_attempts(&self) -> u32 {
        self.poll_attempts
    }

    pub fn link_code(&self) -> Option<&str> {
        self.link_code.as_deref()
    }

    pub fn handshake_started(&self) -> bool {
        self.handshake_started
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}
