//! # scanlot-db: Local Storage for Scanlot
//!
//! This crate provides the local key-value store the pipeline writes to
//! before anything goes over the network. SQLite (via sqlx) is the durable
//! backend; an in-memory backend serves tests and throwaway runs.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scanlot Data Flow                                │
//! │                                                                         │
//! │  PersistenceGateway / SyncCoordinator (scanlot-sync)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   scanlot-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LocalStore   │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (local.rs)   │───►│ price_cache   │    │  (embedded)  │  │   │
//! │  │   │               │    │ sync_queue    │    │              │  │   │
//! │  │   │ Arc<dyn       │    │ backup        │    │ 001_kv_store │  │   │
//! │  │   │ KeyValueStore>│    │ inventory     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite: kv_store(key, value, updated_at)  │  MemoryKvStore    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage error types
//! - [`store`] - The [`KeyValueStore`] capability and its backends
//! - [`repository`] - Typed repositories over the store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scanlot_db::{DbConfig, LocalStore};
//!
//! let local = LocalStore::sqlite(DbConfig::new("path/to/scanlot.db")).await?;
//! let removed = local.price_cache().purge(30).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod local;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use local::LocalStore;
pub use pool::{Database, DbConfig};
pub use store::{KeyValueStore, MemoryKvStore, Namespace};

pub use repository::{
    BackupRepository, InventoryRepository, PriceCacheRepository, SyncQueueRepository,
};
