//! Credential storage port (driven/secondary port)
//!
//! The credential is the only durable state of the engine. Implementations
//! decide how it is protected at rest.

use crate::domain::{Credential, SyncError};

/// Port trait for persisting the credential between runs
pub trait ICredentialStore: Send + Sync {
    /// Loads the stored credential, `None` when nothing is stored
    fn load(&self) -> Result<Option<Credential>, SyncError>;

    /// Persists `credential`, replacing any previous one
    fn save(&self, credential: &Credential) -> Result<(), SyncError>;

    /// Removes the stored credential
    fn clear(&self) -> Result<(), SyncError>;
}
