//! # scanlot-sync: Persistence and Sync for Scanlot
//!
//! This crate moves committed scans out of the device: into the local
//! store first, then to the remote row store, with a FIFO queue bridging
//! the offline gap.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Scanlot Sync Layer                              │
//! │                                                                         │
//! │   BatchSession (scanlot-core)                                          │
//! │        │ commit_session()                                               │
//! │        ▼                                                                │
//! │  ┌────────────────────┐   enqueue when offline   ┌──────────────────┐  │
//! │  │ PersistenceGateway │ ───────────────────────► │   sync_queue     │  │
//! │  │                    │                          │  (scanlot-db)    │  │
//! │  │ price cache        │                          └────────┬─────────┘  │
//! │  │ inventory commit   │                                   │ FIFO       │
//! │  │ backups / export   │                                   ▼            │
//! │  │ relation loading   │                          ┌──────────────────┐  │
//! │  └─────────┬──────────┘                          │ SyncCoordinator  │  │
//! │            │ online                              │ single-flight    │  │
//! │            ▼                                     │ periodic trigger │  │
//! │  ┌─────────────────────────────────────────┐     └────────┬─────────┘  │
//! │  │          RemoteStore (remote.rs)        │ ◄────────────┘            │
//! │  │  insert / select / update / delete /    │                           │
//! │  │  upsert over named tables               │                           │
//! │  └─────────────────────────────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - TOML configuration with `SCANLOT_*` env overrides
//! - [`coordinator`] - `SyncCoordinator`, reports and the periodic trigger
//! - [`error`] - Sync error types
//! - [`gateway`] - `PersistenceGateway`
//! - [`remote`] - The `RemoteStore` capability and an in-memory store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scanlot_sync::{PersistenceGateway, ScanlotConfig, SyncCoordinator};
//!
//! let config = ScanlotConfig::load_or_default(None);
//! let gateway = PersistenceGateway::with_config(local, Some(remote), &config);
//! gateway.commit_session(&mut session, Some("ana"), None).await?;
//!
//! let coordinator = Arc::new(SyncCoordinator::for_gateway(&gateway, config.sync.clone()));
//! let handle = coordinator.start_periodic(config.sync.interval());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod remote;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{
    BackupSettings, CacheSettings, ScanlotConfig, SessionSettings, StorageSettings, SyncSettings,
};
pub use coordinator::{
    ItemFailure, NoOpEmitter, PeriodicSyncHandle, SyncCoordinator, SyncEventEmitter, SyncReport,
    SyncState,
};
pub use error::{SyncError, SyncResult};
pub use gateway::{inventory_row, CommitOutcome, PersistenceGateway, CSV_HEADER};
pub use remote::{InMemoryRemoteStore, RemoteStore};
