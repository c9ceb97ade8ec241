//! [`LocalStore`]: one key-value backend shared by every repository.

use std::sync::Arc;

use crate::error::DbResult;
use crate::pool::{Database, DbConfig};
use crate::repository::{
    BackupRepository, InventoryRepository, PriceCacheRepository, SyncQueueRepository,
};
use crate::store::{KeyValueStore, MemoryKvStore};

/// Handle to local storage. Cheap to clone.
///
/// ## Usage
/// ```rust,ignore
/// let local = LocalStore::sqlite(DbConfig::new("scanlot.db")).await?;
/// local.sync_queue().enqueue(write).await?;
/// ```
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    /// Wraps any key-value backend.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        LocalStore { kv }
    }

    /// Opens (and migrates) a SQLite database.
    pub async fn sqlite(config: DbConfig) -> DbResult<Self> {
        let db = Database::new(config).await?;
        Ok(LocalStore::new(Arc::new(db)))
    }

    /// Ephemeral store backed by a [`MemoryKvStore`].
    pub fn in_memory() -> Self {
        LocalStore::new(Arc::new(MemoryKvStore::new()))
    }

    /// The raw key-value backend.
    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    pub fn price_cache(&self) -> PriceCacheRepository {
        PriceCacheRepository::new(self.kv.clone())
    }

    pub fn sync_queue(&self) -> SyncQueueRepository {
        SyncQueueRepository::new(self.kv.clone())
    }

    pub fn backups(&self) -> BackupRepository {
        BackupRepository::new(self.kv.clone())
    }

    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.kv.clone())
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlot_core::{Money, RemoteWrite};
    use serde_json::json;

    #[tokio::test]
    async fn test_repositories_share_one_backend() {
        let local = LocalStore::sqlite(DbConfig::in_memory()).await.unwrap();

        local
            .price_cache()
            .put("8310", Money::from_cents(12_000), None)
            .await
            .unwrap();
        local
            .sync_queue()
            .enqueue(RemoteWrite::insert("inventario", json!({ "codigo": "x" })))
            .await
            .unwrap();

        assert_eq!(local.sync_queue().len().await.unwrap(), 1);
        assert_eq!(local.price_cache().list().await.unwrap().len(), 1);
        assert_eq!(local.kv().scan_prefix("meta:").await.unwrap().len(), 1);
    }
}
