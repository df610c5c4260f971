//! Use cases (interactors) for SaveSync
//!
//! Use cases sequence domain entities and port calls. Business rules live on
//! the domain types, I/O behind the ports.
//!
//! ## Use Cases
//!
//! - [`SyncOrchestrator`] - Pack/upload and download/unpack of one save at a time
//! - [`LinkFlowController`] - Device-link polling and in-game handshake
//!
//! [`TempPathGuard`] provides the scoped cleanup both rely on.

pub mod cleanup;
pub mod link_device;
pub mod sync_save;

pub use cleanup::TempPathGuard;
pub use link_device::{LinkFlowController, LinkSettings, LinkSnapshot};
pub use sync_save::{
    OrchestratorSettings, OverwriteConfirmation, PendingUpload, ProgressSnapshot,
    SyncOrchestrator, SyncPhase, UploadGate,
};
