//! # Key-Value Store
//!
//! The local storage capability every repository is built on.
//!
//! ## Namespaces
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One store, many sub-ranges                         │
//! │                                                                         │
//! │  price_cache:8310                  → PriceCacheRecord                  │
//! │  sync_queue:00000000000000000007   → SyncQueueItem                     │
//! │  backup:2026-10-17T09:30:00.1…Z    → BackupSnapshot                    │
//! │  inventory:00000000000000000042    → InventoryRecord                   │
//! │  meta:sync_queue_seq               → "7"                               │
//! │                                                                         │
//! │  scan_prefix("sync_queue:") returns keys in byte order, which is       │
//! │  insertion order for zero-padded sequence keys.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations: [`crate::Database`] (SQLite) and [`MemoryKvStore`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DbError, DbResult};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKvStore;

// =============================================================================
// Capability
// =============================================================================

/// String keys to string values, with ordered prefix scans.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads one value.
    async fn get(&self, key: &str) -> DbResult<Option<String>>;

    /// Writes one value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> DbResult<()>;

    /// Writes every entry or none of them.
    async fn set_many(&self, entries: &[(String, String)]) -> DbResult<()>;

    /// Deletes one key. Returns true if it existed.
    async fn remove(&self, key: &str) -> DbResult<bool>;

    /// Returns every `(key, value)` whose key starts with `prefix`, ordered
    /// by key.
    async fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<(String, String)>>;

    /// Atomically increments the integer counter at `key` (missing = 0) and
    /// returns the new value.
    async fn increment(&self, key: &str) -> DbResult<u64>;
}

// =============================================================================
// Namespaces
// =============================================================================

/// A key prefix owning one sub-range of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace(&'static str);

impl Namespace {
    pub const PRICE_CACHE: Namespace = Namespace("price_cache:");
    pub const SYNC_QUEUE: Namespace = Namespace("sync_queue:");
    pub const BACKUP: Namespace = Namespace("backup:");
    pub const INVENTORY: Namespace = Namespace("inventory:");
    pub const META: Namespace = Namespace("meta:");

    /// The prefix including its trailing separator.
    pub fn prefix(&self) -> &'static str {
        self.0
    }

    /// Full key for `suffix` in this namespace.
    pub fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }

    /// Full key for a sequence number, zero-padded so byte order is
    /// numeric order.
    pub fn seq_key(&self, seq: u64) -> String {
        format!("{}{:020}", self.0, seq)
    }

    /// Strips this namespace from a full key.
    pub fn suffix<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.0)
    }
}

// =============================================================================
// JSON Helpers
// =============================================================================

/// Reads and decodes a JSON value.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> DbResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| DbError::serialization(key, e)),
        None => Ok(None),
    }
}

/// Encodes and writes a JSON value.
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> DbResult<()> {
    let raw = serde_json::to_string(value).map_err(|e| DbError::serialization(key, e))?;
    store.set(key, &raw).await
}

/// Reads and decodes every value in a namespace, in key order.
pub async fn scan_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    namespace: Namespace,
) -> DbResult<Vec<(String, T)>> {
    store
        .scan_prefix(namespace.prefix())
        .await?
        .into_iter()
        .map(|(key, raw)| {
            serde_json::from_str(&raw)
                .map(|value| (key.clone(), value))
                .map_err(|e| DbError::serialization(key, e))
        })
        .collect()
}

// =============================================================================
// Shared contract tests
// =============================================================================

/// Behaviour every [`KeyValueStore`] must show; run against each backend.
#[cfg(test)]
pub(crate) async fn assert_store_contract(store: &dyn KeyValueStore) {
    assert_eq!(store.get("a:1").await.unwrap(), None);

    store.set("a:1", "one").await.unwrap();
    store.set("a:2", "two").await.unwrap();
    store.set("b:1", "other").await.unwrap();
    store.set("a:1", "uno").await.unwrap();
    assert_eq!(store.get("a:1").await.unwrap().as_deref(), Some("uno"));

    let scanned = store.scan_prefix("a:").await.unwrap();
    assert_eq!(
        scanned,
        vec![
            ("a:1".to_string(), "uno".to_string()),
            ("a:2".to_string(), "two".to_string()),
        ]
    );

    let batch = vec![
        ("c:1".to_string(), "x".to_string()),
        ("c:2".to_string(), "y".to_string()),
    ];
    store.set_many(&batch).await.unwrap();
    assert_eq!(store.scan_prefix("c:").await.unwrap(), batch);
    store.set_many(&[]).await.unwrap();

    assert!(store.remove("a:1").await.unwrap());
    assert!(!store.remove("a:1").await.unwrap());
    assert_eq!(store.scan_prefix("a:").await.unwrap().len(), 1);

    assert_eq!(store.increment("meta:seq").await.unwrap(), 1);
    assert_eq!(store.increment("meta:seq").await.unwrap(), 2);
    assert_eq!(store.get("meta:seq").await.unwrap().as_deref(), Some("2"));

    let ns = Namespace::SYNC_QUEUE;
    for seq in [10u64, 9, 100] {
        store.set(&ns.seq_key(seq), "x").await.unwrap();
    }
    let order: Vec<_> = store
        .scan_prefix(ns.prefix())
        .await
        .unwrap()
        .into_iter()
        .map(|(k, _)| ns.suffix(&k).unwrap().parse::<u64>().unwrap())
        .collect();
    assert_eq!(order, vec![9, 10, 100]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_keys() {
        assert_eq!(Namespace::PRICE_CACHE.key("8310"), "price_cache:8310");
        assert_eq!(
            Namespace::SYNC_QUEUE.seq_key(7),
            "sync_queue:00000000000000000007"
        );
        assert_eq!(Namespace::BACKUP.suffix("backup:xyz"), Some("xyz"));
        assert_eq!(Namespace::BACKUP.suffix("inventory:xyz"), None);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = MemoryKvStore::new();
        set_json(&store, "meta:value", &vec![1, 2, 3]).await.unwrap();

        let value: Option<Vec<i32>> = get_json(&store, "meta:value").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        store.set("meta:broken", "{not json").await.unwrap();
        let err = get_json::<Vec<i32>>(&store, "meta:broken").await.unwrap_err();
        assert!(matches!(err, DbError::Serialization { .. }));

        let scanned = scan_json::<Vec<i32>>(&store, Namespace::META).await;
        assert!(scanned.is_err(), "broken value must fail the whole scan");
    }
}
