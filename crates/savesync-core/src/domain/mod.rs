//! Domain entities and business logic
//!
//! This module contains the core domain types for SaveSync:
//! - Newtypes for remote identifiers and the credential
//! - Save items (local directories and remote archives)
//! - Transfer sessions and the throughput estimator
//! - Device-link flow state
//! - Filesystem naming rules
//! - Domain-specific error types

pub mod errors;
pub mod link;
pub mod naming;
pub mod newtypes;
pub mod progress;
pub mod save_item;
pub mod session;

// Re-export commonly used types
pub use errors::{DomainError, SyncError};
pub use link::{LinkFlow, LinkState};
pub use naming::{names_collide, sanitize_folder_name, unique_child_dir};
pub use newtypes::*;
pub use progress::{format_bytes, format_bytes_floor, format_duration, ProgressEstimator};
pub use save_item::{QuotaUsage, SaveItem, SaveLocation, REMOTE_QUOTA_BYTES};
pub use session::{Direction, TransferSession};
