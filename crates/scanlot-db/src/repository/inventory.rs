//! Locally committed inventory records. Every commit lands here before any
//! remote write is attempted; backups and exports read from here.

use std::sync::Arc;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::{scan_json, KeyValueStore, Namespace};
use scanlot_core::InventoryRecord;

const SEQ_KEY: &str = "meta:inventory_seq";

/// Repository for inventory records.
#[derive(Clone)]
pub struct InventoryRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl InventoryRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        InventoryRepository { kv }
    }

    /// Appends records in order, all or none. Returns how many were written.
    ///
    /// Sequence numbers are reserved first; a failed write leaves a gap in
    /// the sequence, never a partial batch.
    pub async fn insert_many(&self, records: &[InventoryRecord]) -> DbResult<usize> {
        let mut batch = Vec::with_capacity(records.len());
        for record in records {
            let seq = self.kv.increment(SEQ_KEY).await?;
            let key = Namespace::INVENTORY.seq_key(seq);
            let raw = serde_json::to_string(record).map_err(|e| DbError::serialization(&key, e))?;
            batch.push((key, raw));
        }
        self.kv.set_many(&batch).await?;
        debug!(count = records.len(), "Stored inventory records");
        Ok(records.len())
    }

    /// Every record, in insertion order.
    pub async fn list(&self) -> DbResult<Vec<InventoryRecord>> {
        Ok(scan_json(self.kv.as_ref(), Namespace::INVENTORY)
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    pub async fn count(&self) -> DbResult<usize> {
        Ok(self.kv.scan_prefix(Namespace::INVENTORY.prefix()).await?.len())
    }

    /// Removes every record. Returns how many were removed.
    pub async fn clear(&self) -> DbResult<usize> {
        let mut removed = 0;
        for (key, _) in self.kv.scan_prefix(Namespace::INVENTORY.prefix()).await? {
            if self.kv.remove(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
