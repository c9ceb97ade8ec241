//! In-memory [`KeyValueStore`] for tests and ephemeral runs.
//!
//! An optional key capacity makes it possible to exercise the
//! [`DbError::QuotaExceeded`] path without filling a disk.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::KeyValueStore;
use crate::error::{DbError, DbResult};

/// Ordered map behind a tokio `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
    capacity: Option<usize>,
    unavailable: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes creating more than `max_keys` keys.
    pub fn with_capacity(max_keys: usize) -> Self {
        MemoryKvStore {
            capacity: Some(max_keys),
            ..Self::default()
        }
    }

    /// Makes every subsequent operation fail with [`DbError::Unavailable`]
    /// (or succeed again when `false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }

    fn check_capacity(&self, entries: &BTreeMap<String, String>, key: &str) -> DbResult<()> {
        match self.capacity {
            Some(max) if !entries.contains_key(key) && entries.len() >= max => Err(
                DbError::QuotaExceeded(format!("capacity of {} keys reached", max)),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        self.check_available()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        self.check_capacity(&entries, key)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_many(&self, batch: &[(String, String)]) -> DbResult<()> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        if let Some(max) = self.capacity {
            let mut new_keys: Vec<&str> = batch
                .iter()
                .map(|(key, _)| key.as_str())
                .filter(|key| !entries.contains_key(*key))
                .collect();
            new_keys.sort_unstable();
            new_keys.dedup();
            if entries.len() + new_keys.len() > max {
                return Err(DbError::QuotaExceeded(format!(
                    "capacity of {} keys reached",
                    max
                )));
            }
        }
        for (key, value) in batch {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<bool> {
        self.check_available()?;
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<(String, String)>> {
        self.check_available()?;
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn increment(&self, key: &str) -> DbResult<u64> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| DbError::serialization(key, e))?,
            None => {
                self.check_capacity(&entries, key)?;
                0
            }
        };
        let next = current + 1;
        entries.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::assert_store_contract;

    #[tokio::test]
    async fn test_memory_store_contract() {
        assert_store_contract(&MemoryKvStore::new()).await;
    }

    #[tokio::test]
    async fn test_capacity_limits_new_keys_only() {
        let store = MemoryKvStore::with_capacity(1);
        store.set("k:1", "a").await.unwrap();
        store.set("k:1", "b").await.unwrap();

        let err = store.set("k:2", "c").await.unwrap_err();
        assert!(matches!(err, DbError::QuotaExceeded(_)));
        assert_eq!(store.get("k:1").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_set_many_over_capacity_writes_nothing() {
        let store = MemoryKvStore::with_capacity(2);
        store.set("k:1", "a").await.unwrap();

        let batch = vec![
            ("k:1".to_string(), "b".to_string()),
            ("k:2".to_string(), "c".to_string()),
            ("k:3".to_string(), "d".to_string()),
        ];
        let err = store.set_many(&batch).await.unwrap_err();
        assert!(matches!(err, DbError::QuotaExceeded(_)));
        assert_eq!(store.get("k:1").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.get("k:2").await.unwrap(), None);

        store.set_many(&batch[..2]).await.unwrap();
        assert_eq!(store.get("k:1").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_unavailable_toggle() {
        let store = MemoryKvStore::new();
        store.set_unavailable(true);
        assert!(store.get("k").await.unwrap_err().is_unavailable());

        store.set_unavailable(false);
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
