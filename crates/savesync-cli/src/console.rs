//! Console adapters for the presentation ports
//!
//! The CLI has no scripted game client, so [`ConsoleGameSession`] tells the
//! user what to do in game instead. [`ConsoleNotifier`] prints the
//! engine's success and failure notifications through the active formatter.

use std::sync::atomic::{AtomicBool, Ordering};

use savesync_core::domain::SyncError;
use savesync_core::ports::{IGameSession, INotificationService, Notification, NotificationPriority};
use tracing::debug;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Game session that prints instructions for the player
pub struct ConsoleGameSession {
    formatter: Box<dyn OutputFormatter>,
    joined: AtomicBool,
}

impl ConsoleGameSession {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            formatter: get_formatter(format.is_json()),
            joined: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl IGameSession for ConsoleGameSession {
    async fn join_server(&self, address: &str) -> Result<(), SyncError> {
        self.formatter.info("");
        self.formatter.info(&format!("Join the server {} in game", address));
        self.joined.store(true, Ordering::Release);
        Ok(())
    }

    async fn is_session_ready(&self) -> bool {
        self.joined.load(Ordering::Acquire)
    }

    async fn send_command(&self, command: &str) -> Result<(), SyncError> {
        self.formatter.info(&format!("Then type in chat: {}", command));
        self.formatter.info("");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SyncError> {
        self.joined.store(false, Ordering::Release);
        debug!("Console game session released");
        Ok(())
    }
}

/// Prints notifications; high-priority ones go out as errors
pub struct ConsoleNotifier {
    formatter: Box<dyn OutputFormatter>,
    verbose: bool,
}

impl ConsoleNotifier {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self {
            formatter: get_formatter(format.is_json()),
            verbose,
        }
    }
}

#[async_trait::async_trait]
impl INotificationService for ConsoleNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let line = format!("{}: {}", notification.title, notification.body);
        if notification.priority == NotificationPriority::High {
            self.formatter.error(&line);
            if let (true, Some(details)) = (self.verbose, notification.details.as_deref()) {
                self.formatter.info(details);
            }
        } else {
            self.formatter.success(&line);
        }
        Ok(())
    }
}
