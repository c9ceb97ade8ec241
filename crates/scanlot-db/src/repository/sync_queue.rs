//! # Sync Queue Repository
//!
//! Remote writes that could not be delivered, replayed later by the sync
//! coordinator.
//!
//! ## The Queue
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Offline write queue                                  │
//! │                                                                         │
//! │  commit while offline                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue(RemoteWrite)                                                  │
//! │       │  id = increment("meta:sync_queue_seq")                         │
//! │       ▼                                                                 │
//! │  sync_queue:00000000000000000001  { payload, retry_count: 0, ... }     │
//! │  sync_queue:00000000000000000002  ...                                  │
//! │       │                                                                 │
//! │       ▼  replay in key order (= enqueue order)                         │
//! │  ┌──────────────────────────┬──────────────────────────────────────┐   │
//! │  │ remote accepted          │ remote rejected                      │   │
//! │  │ mark_synced → key gone   │ mark_failed → retry_count += 1       │   │
//! │  └──────────────────────────┴──────────────────────────────────────┘   │
//! │                                                                         │
//! │  An item is never removed unless its write succeeded (or it is         │
//! │  removed explicitly).                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::store::{get_json, scan_json, set_json, KeyValueStore, Namespace};
use scanlot_core::{QueueItemStatus, QueueStats, RemoteWrite, SyncQueueItem};

const SEQ_KEY: &str = "meta:sync_queue_seq";

/// Repository for queued remote writes.
#[derive(Clone)]
pub struct SyncQueueRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl SyncQueueRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        SyncQueueRepository { kv }
    }

    /// Appends a write to the tail of the queue.
    ///
    /// Ids come from an atomic counter, so concurrent enqueues never
    /// overwrite each other.
    pub async fn enqueue(&self, payload: RemoteWrite) -> DbResult<SyncQueueItem> {
        let id = self.kv.increment(SEQ_KEY).await?;
        let item = SyncQueueItem {
            id,
            payload,
            retry_count: 0,
            enqueued_at: Utc::now(),
            status: QueueItemStatus::Pending,
            last_error: None,
        };

        debug!(id, table = %item.payload.table, "Queuing remote write");
        set_json(self.kv.as_ref(), &Namespace::SYNC_QUEUE.seq_key(id), &item).await?;
        Ok(item)
    }

    /// Every queued item, oldest first.
    pub async fn list(&self) -> DbResult<Vec<SyncQueueItem>> {
        Ok(scan_json(self.kv.as_ref(), Namespace::SYNC_QUEUE)
            .await?
            .into_iter()
            .map(|(_, item)| item)
            .collect())
    }

    /// One item by id.
    pub async fn get(&self, id: u64) -> DbResult<Option<SyncQueueItem>> {
        get_json(self.kv.as_ref(), &Namespace::SYNC_QUEUE.seq_key(id)).await
    }

    /// Number of queued items.
    pub async fn len(&self) -> DbResult<usize> {
        Ok(self.kv.scan_prefix(Namespace::SYNC_QUEUE.prefix()).await?.len())
    }

    /// Returns true if nothing is queued.
    pub async fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Counts by status.
    pub async fn stats(&self) -> DbResult<QueueStats> {
        let items = self.list().await?;
        let failed = items
            .iter()
            .filter(|item| item.status == QueueItemStatus::Failed)
            .count();
        Ok(QueueStats {
            total: items.len(),
            pending: items.len() - failed,
            failed,
        })
    }

    /// Removes an item whose write the remote accepted.
    pub async fn mark_synced(&self, id: u64) -> DbResult<()> {
        if self.kv.remove(&Namespace::SYNC_QUEUE.seq_key(id)).await? {
            debug!(id, "Queue item synced");
            Ok(())
        } else {
            Err(DbError::not_found("Sync queue item", id.to_string()))
        }
    }

    /// Records a failed delivery attempt. Returns the updated item.
    pub async fn mark_failed(&self, id: u64, error: &str) -> DbResult<SyncQueueItem> {
        let key = Namespace::SYNC_QUEUE.seq_key(id);
        let mut item: SyncQueueItem = get_json(self.kv.as_ref(), &key)
            .await?
            .ok_or_else(|| DbError::not_found("Sync queue item", id.to_string()))?;

        item.retry_count += 1;
        item.status = QueueItemStatus::Failed;
        item.last_error = Some(error.to_string());

        warn!(id, retry_count = item.retry_count, error = %error, "Queue item failed");
        set_json(self.kv.as_ref(), &key, &item).await?;
        Ok(item)
    }

    /// Drops one item without delivering it. Returns true if it existed.
    pub async fn remove_by_id(&self, id: u64) -> DbResult<bool> {
        self.kv.remove(&Namespace::SYNC_QUEUE.seq_key(id)).await
    }

    /// Drops every queued item. Returns how many were removed.
    pub async fn clear(&self) -> DbResult<usize> {
        let mut removed = 0;
        for (key, _) in self.kv.scan_prefix(Namespace::SYNC_QUEUE.prefix()).await? {
            if self.kv.remove(&key).await? {
                removed += 1;
            }
        }
        info!(removed, "Cleared sync queue");
        Ok(removed)
    }
}
