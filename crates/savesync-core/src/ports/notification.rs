//! Notification port (driven/secondary port)
//!
//! Fire-and-forget success and error messages for the presentation layer,
//! the equivalent of a toast. Live progress is not pushed through here; the
//! presentation layer reads the orchestrator's snapshot handle instead.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because delivery failures are adapter-specific.
//! - Callers log and ignore delivery failures.

use serde::{Deserialize, Serialize};

/// Priority level for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short headline, e.g. "Upload complete"
    pub title: String,
    /// One-line body
    pub body: String,
    /// Raw error text shown on demand
    pub details: Option<String>,
    pub priority: NotificationPriority,
    /// Grouping key: "transfer", "link" or "error"
    pub category: String,
}

impl Notification {
    /// Creates a notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            details: None,
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Transfer success
    pub fn transfer(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_category("transfer")
    }

    /// Link flow progress or success
    pub fn link(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_category("link")
    }

    /// Failure with High priority
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("error")
    }
}

/// Port trait for user-facing notifications
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Delivers a notification to the user
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}
