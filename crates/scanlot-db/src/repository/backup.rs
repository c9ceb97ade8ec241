//! # Backup Repository
//!
//! Timestamped snapshots of the local inventory records.
//!
//! Keys are `backup:` followed by the RFC 3339 creation time with
//! nanosecond precision in UTC, so key order is creation order.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::store::{get_json, scan_json, set_json, KeyValueStore, Namespace};
use scanlot_core::{BackupSnapshot, BackupSummary, InventoryRecord};

fn backup_key(created_at: DateTime<Utc>) -> String {
    Namespace::BACKUP.key(&created_at.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Repository for inventory backups.
#[derive(Clone)]
pub struct BackupRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl BackupRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        BackupRepository { kv }
    }

    /// Stores a snapshot of `records` taken now.
    pub async fn create(&self, records: Vec<InventoryRecord>) -> DbResult<BackupSummary> {
        self.create_at(records, Utc::now()).await
    }

    /// Stores a snapshot with an explicit creation time.
    pub async fn create_at(
        &self,
        records: Vec<InventoryRecord>,
        created_at: DateTime<Utc>,
    ) -> DbResult<BackupSummary> {
        let snapshot = BackupSnapshot {
            created_at,
            records,
        };
        set_json(self.kv.as_ref(), &backup_key(created_at), &snapshot).await?;

        info!(
            created_at = %created_at,
            records = snapshot.records.len(),
            "Backup created"
        );
        Ok(BackupSummary {
            created_at,
            record_count: snapshot.records.len(),
        })
    }

    /// Returns the snapshot written at `created_at`.
    pub async fn restore(&self, created_at: DateTime<Utc>) -> DbResult<BackupSnapshot> {
        get_json(self.kv.as_ref(), &backup_key(created_at))
            .await?
            .ok_or_else(|| DbError::not_found("Backup", created_at.to_rfc3339()))
    }

    /// The most recent snapshot, if any.
    pub async fn latest(&self) -> DbResult<Option<BackupSnapshot>> {
        Ok(self.snapshots().await?.pop())
    }

    /// Summaries of every stored backup, newest first.
    pub async fn list(&self) -> DbResult<Vec<BackupSummary>> {
        Ok(self
            .snapshots()
            .await?
            .into_iter()
            .rev()
            .map(|snapshot| BackupSummary {
                created_at: snapshot.created_at,
                record_count: snapshot.records.len(),
            })
            .collect())
    }

    /// Deletes backups created strictly more than `retention_days` ago.
    pub async fn prune(&self, retention_days: u32) -> DbResult<usize> {
        self.prune_as_of(retention_days, Utc::now()).await
    }

    /// [`prune`](Self::prune) against an explicit clock.
    pub async fn prune_as_of(&self, retention_days: u32, now: DateTime<Utc>) -> DbResult<usize> {
        let cutoff = now - Duration::days(i64::from(retention_days));
        let mut removed = 0;

        for (key, snapshot) in scan_json::<BackupSnapshot>(self.kv.as_ref(), Namespace::BACKUP).await? {
            if snapshot.created_at < cutoff && self.kv.remove(&key).await? {
                removed += 1;
            }
        }

        info!(removed, retention_days, "Pruned backups");
        Ok(removed)
    }

    /// Oldest first.
    async fn snapshots(&self) -> DbResult<Vec<BackupSnapshot>> {
        Ok(scan_json(self.kv.as_ref(), Namespace::BACKUP)
            .await?
            .into_iter()
            .map(|(_, snapshot)| snapshot)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;
    use scanlot_core::Money;

    fn repo() -> BackupRepository {
        BackupRepository::new(Arc::new(MemoryKvStore::new()))
    }

    fn record(code: &str) -> InventoryRecord {
        InventoryRecord {
            id: format!("id-{}", code),
            code: code.to_string(),
            variant: String::new(),
            name: "Producto".to_string(),
            brand: None,
            category: None,
            unit: "pz".to_string(),
            quantity: 1,
            unit_price: Money::from_cents(100),
            lot: None,
            notes: None,
            location: None,
            user: None,
            recorded_at: Utc::now(),
            batch_id: None,
            primary_code: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_restore() {
        let repo = repo();
        let summary = repo
            .create(vec![record("a"), record("b")])
            .await
            .unwrap();
        assert_eq!(summary.record_count, 2);

        let snapshot = repo.restore(summary.created_at).await.unwrap();
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.created_at, summary.created_at);
    }

    #[tokio::test]
    async fn test_restore_unknown_is_not_found() {
        let err = repo().restore(Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_newest_first_and_latest() {
        let repo = repo();
        let now = Utc::now();
        repo.create_at(vec![record("old")], now - Duration::days(2))
            .await
            .unwrap();
        repo.create_at(vec![record("new"), record("x")], now)
            .await
            .unwrap();

        let list = repo.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].created_at, now);
        assert_eq!(list[0].record_count, 2);

        let latest = repo.latest().await.unwrap().unwrap();
        assert_eq!(latest.records[0].code, "new");
    }

    #[tokio::test]
    async fn test_prune_is_strict() {
        let repo = repo();
        let now = Utc::now();
        repo.create_at(vec![], now - Duration::days(8)).await.unwrap();
        repo.create_at(vec![], now - Duration::days(7)).await.unwrap();
        repo.create_at(vec![], now - Duration::days(1)).await.unwrap();

        let removed = repo.prune_as_of(7, now).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}
