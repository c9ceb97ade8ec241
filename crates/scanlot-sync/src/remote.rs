//! # Remote Row Store
//!
//! The capability the gateway and coordinator write through. Rows are JSON
//! objects; tables are addressed by name.
//!
//! ## Contract
//! ```text
//! insert(table, row)            -> row
//! select(table, filter)         -> rows
//! update(table, filter, patch)  -> rows updated
//! delete(table, filter)         -> rows deleted
//! upsert(table, row, key)       -> row       (select + update | insert)
//! ```
//!
//! Connectivity is probed with a one-row read of the products table
//! ([`is_reachable`]).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use scanlot_core::{RemoteWrite, RowFilter, WriteOp, PRODUCTS_TABLE};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Capability
// =============================================================================

/// A remote table store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert(&self, table: &str, row: Value) -> SyncResult<Value>;

    async fn select(&self, table: &str, filter: &RowFilter) -> SyncResult<Vec<Value>>;

    /// Merges `patch` into every row matching `filter`.
    async fn update(&self, table: &str, filter: &RowFilter, patch: Value) -> SyncResult<Vec<Value>>;

    async fn delete(&self, table: &str, filter: &RowFilter) -> SyncResult<Vec<Value>>;

    /// Updates the rows matching `key`, or inserts `row` when none match.
    async fn upsert(&self, table: &str, row: Value, key: &RowFilter) -> SyncResult<Value> {
        if self.select(table, key).await?.is_empty() {
            self.insert(table, row).await
        } else {
            let mut updated = self.update(table, key, row.clone()).await?;
            Ok(updated.pop().unwrap_or(row))
        }
    }
}

/// Returns true if the remote answers a lightweight read.
pub async fn is_reachable(remote: &dyn RemoteStore) -> bool {
    match remote
        .select(PRODUCTS_TABLE, &RowFilter::all().limit(1))
        .await
    {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "Remote probe failed");
            false
        }
    }
}

/// Executes one queued write against the remote.
pub async fn apply(remote: &dyn RemoteStore, write: &RemoteWrite) -> SyncResult<()> {
    let filter = || {
        write.filter.clone().ok_or_else(|| {
            SyncError::Remote(format!("{:?} on '{}' needs a row filter", write.op, write.table))
        })
    };

    match write.op {
        WriteOp::Insert => {
            remote.insert(&write.table, write.row.clone()).await?;
        }
        WriteOp::Update => {
            remote.update(&write.table, &filter()?, write.row.clone()).await?;
        }
        WriteOp::Upsert => {
            remote.upsert(&write.table, write.row.clone(), &filter()?).await?;
        }
        WriteOp::Delete => {
            remote.delete(&write.table, &filter()?).await?;
        }
    }
    Ok(())
}

/// Merges the fields of `patch` into `row`. Non-object patches replace.
pub(crate) fn merge_patch(row: &mut Value, patch: &Value) {
    match (row.as_object_mut(), patch.as_object()) {
        (Some(target), Some(fields)) => {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => *row = patch.clone(),
    }
}

// =============================================================================
// In-Memory Remote
// =============================================================================

/// Tables held in memory, with switches for reachability and per-row
/// failures.
///
/// ## Usage
/// ```rust,ignore
/// let remote = InMemoryRemoteStore::new();
/// remote.set_reachable(false);             // probe fails, writes fail
/// remote.fail_rows_where("codigo", "bad"); // only matching inserts fail
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    unreachable: AtomicBool,
    failing: std::sync::Mutex<HashSet<(String, String)>>,
    writes: AtomicUsize,
    latency: Option<Duration>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a delay to every call, so concurrent callers overlap.
    pub fn with_latency(latency: Duration) -> Self {
        InMemoryRemoteStore {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Writes of rows whose `column` equals `value` (compared as text) fail.
    pub fn fail_rows_where(&self, column: &str, value: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert((column.to_string(), value.to_string()));
        }
    }

    /// Clears every per-row failure.
    pub fn clear_failures(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    /// Number of successful mutating calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of a table's rows.
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces a table's rows (seeding fixtures).
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables.lock().await.insert(table.to_string(), rows);
    }

    /// Every table, for persisting to disk.
    pub async fn dump(&self) -> HashMap<String, Vec<Value>> {
        self.tables.lock().await.clone()
    }

    async fn enter(&self) -> SyncResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::Remote("remote unreachable".into()));
        }
        Ok(())
    }

    fn check_row(&self, row: &Value) -> SyncResult<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|_| SyncError::Internal("failure set poisoned".into()))?;
        for (column, value) in failing.iter() {
            let hit = match row.get(column) {
                Some(Value::String(s)) => s == value,
                Some(other) => other.to_string() == *value,
                None => false,
            };
            if hit {
                return Err(SyncError::Remote(format!(
                    "row rejected: {} = {}",
                    column, value
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn insert(&self, table: &str, row: Value) -> SyncResult<Value> {
        self.enter().await?;
        self.check_row(&row)?;
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn select(&self, table: &str, filter: &RowFilter) -> SyncResult<Vec<Value>> {
        self.enter().await?;
        let tables = self.tables.lock().await;
        let rows = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .take(filter.limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn update(&self, table: &str, filter: &RowFilter, patch: Value) -> SyncResult<Vec<Value>> {
        self.enter().await?;
        self.check_row(&patch)?;
        let mut tables = self.tables.lock().await;
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                merge_patch(row, &patch);
                updated.push(row.clone());
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &RowFilter) -> SyncResult<Vec<Value>> {
        self.enter().await?;
        let mut tables = self.tables.lock().await;
        let mut deleted = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            let (gone, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|row| filter.matches(row));
            *rows = kept;
            deleted = gone;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(deleted)
    }
}
