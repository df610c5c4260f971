//! SaveSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SaveItem`, `TransferSession`, `LinkFlow`, `ProgressEstimator`
//! - **Use cases** - `SyncOrchestrator` (pack/transfer/unpack), `LinkFlowController` (device linking)
//! - **Port definitions** - Traits for adapters: `ICloudStore`, `IArchiver`, `ILocalSaves`,
//!   `ICredentialStore`, `IGameSession`, `INotificationService`
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`savesync-api` for the remote store, `savesync-archive` for zip handling).
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
