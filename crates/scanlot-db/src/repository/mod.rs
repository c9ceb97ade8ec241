//! # Repository Module
//!
//! Typed repositories over the local [`KeyValueStore`](crate::KeyValueStore).
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories over one KV store                       │
//! │                                                                         │
//! │  PersistenceGateway                                                    │
//! │       │                                                                 │
//! │       │  local.price_cache().get_fresh("8310", 30)                     │
//! │       ▼                                                                 │
//! │  PriceCacheRepository ──┐                                              │
//! │  SyncQueueRepository ───┤   JSON values under                          │
//! │  BackupRepository ──────┼── namespaced keys                            │
//! │  InventoryRepository ───┘       │                                       │
//! │                                 ▼                                       │
//! │                    Database (SQLite) │ MemoryKvStore                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`PriceCacheRepository`] - PLU → price-per-kilo with age-based purge
//! - [`SyncQueueRepository`] - FIFO queue of remote writes
//! - [`BackupRepository`] - timestamped inventory snapshots
//! - [`InventoryRepository`] - locally committed inventory lines

pub mod backup;
pub mod inventory;
pub mod price_cache;
pub mod sync_queue;

pub use backup::BackupRepository;
pub use inventory::InventoryRepository;
pub use price_cache::PriceCacheRepository;
pub use sync_queue::SyncQueueRepository;

use chrono::{DateTime, Duration, Utc};

/// Time elapsed between `then` and `now`; negative for future timestamps.
pub(crate) fn age(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(then)
}
