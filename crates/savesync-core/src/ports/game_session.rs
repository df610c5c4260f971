//! Game session port (driving the host's in-game client)
//!
//! The link handshake joins a well-known server and sends the link code as a
//! chat command. Hosts without a scripted client can implement this by
//! instructing the user instead.

use crate::domain::SyncError;

/// Port trait for the scripted in-game session
#[async_trait::async_trait]
pub trait IGameSession: Send + Sync {
    /// Connects to the server at `address`
    async fn join_server(&self, address: &str) -> Result<(), SyncError>;

    /// Returns true once the session can accept commands
    async fn is_session_ready(&self) -> bool;

    /// Sends a chat command such as `/link ABC123`
    async fn send_command(&self, command: &str) -> Result<(), SyncError>;

    /// Leaves the server
    async fn disconnect(&self) -> Result<(), SyncError>;
}
