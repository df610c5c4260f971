//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICloudStore`] - Remote save store: list, names, upload, download, delete, link flow
//! - [`IArchiver`] - Packing world directories into zips and safely unpacking them
//! - [`ILocalSaves`] - Enumerating world directories on disk
//! - [`ICredentialStore`] - Persisting the credential between runs
//! - [`IGameSession`] - The host's scripted in-game session used by the link handshake
//! - [`INotificationService`] - Success/error notifications for the presentation layer

pub mod archiver;
pub mod cloud_store;
pub mod credential_store;
pub mod game_session;
pub mod local_saves;
pub mod notification;

pub use archiver::IArchiver;
pub use cloud_store::{ICloudStore, LinkInitiation, LinkStatus, LinkStatusKind, ProgressFn};
pub use credential_store::ICredentialStore;
pub use game_session::IGameSession;
pub use local_saves::ILocalSaves;
pub use notification::{INotificationService, Notification, NotificationPriority};
