//! # Persistence Gateway
//!
//! Everything that leaves the in-memory session goes through here: the
//! local price cache, committed inventory, backups, exports and the remote
//! row store.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          commit(records)                                │
//! │                                                                         │
//! │  1. local.inventory().insert_many(records)   ← must succeed            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. remote configured and is_reachable()?                              │
//! │       │                                                                 │
//! │   ┌───┴──────────────────────────┐                                     │
//! │   │ yes                          │ no                                  │
//! │   ▼                              ▼                                     │
//! │  insert each row into         enqueue RemoteWrite::insert              │
//! │  `inventario`; a row that     into the sync queue                      │
//! │  fails is enqueued instead                                             │
//! │                                                                         │
//! │  Once step 1 has succeeded the commit reports success. A row that      │
//! │  could not be queued either is counted in `queue_failed`.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Session Commits
//! `commit_session` annotates the records before committing them:
//! - `lot`: highest remote `lote` for the code plus one, `"1"` offline
//! - `notes`: PLU, weight and price per kilo for weighed items, and the
//!   primary product for subproducts
//! - `primary_code`: the owning primary, from the relation table

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use scanlot_core::barcode::{self, portion_grams};
use scanlot_core::{
    BackupSnapshot, BackupSummary, BarcodeFormat, BatchSession, CodeKind, ExportFormat,
    InventoryRecord, Money, PriceCacheRecord, ProductMeta, ProductRelation, RelationRow,
    RemoteWrite, RowFilter, SessionEntry, INVENTORY_TABLE, RELATIONS_TABLE,
};
use scanlot_db::LocalStore;

use crate::config::ScanlotConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::{self, RemoteStore};

/// CSV columns, in order.
pub const CSV_HEADER: [&str; 7] = ["code", "name", "brand", "quantity", "unit", "date", "location"];

// =============================================================================
// Outcomes
// =============================================================================

/// What happened to a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    /// Records written to the local store.
    pub stored: usize,
    /// Records written to the remote store directly.
    pub remote_written: usize,
    /// Records queued for the sync coordinator.
    pub queued: usize,
    /// Records stored locally that reached neither the remote store nor
    /// the sync queue.
    pub queue_failed: usize,
}

impl CommitOutcome {
    /// True when every record reached the remote store.
    pub fn is_fully_synced(&self) -> bool {
        self.queued == 0 && self.queue_failed == 0
    }
}

/// First lot number for a code with no remote history.
pub const FIRST_LOT: &str = "1";

// =============================================================================
// Gateway
// =============================================================================

/// Local store plus an optional remote store.
#[derive(Clone)]
pub struct PersistenceGateway {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    price_ttl_days: u32,
    default_price_per_kilo: Money,
}

impl PersistenceGateway {
    /// Creates a gateway with default cache settings.
    pub fn new(local: LocalStore, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self::with_config(local, remote, &ScanlotConfig::default())
    }

    /// Creates a gateway using the cache and session settings of `config`.
    pub fn with_config(
        local: LocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
        config: &ScanlotConfig,
    ) -> Self {
        PersistenceGateway {
            local,
            remote,
            price_ttl_days: config.cache.price_ttl_days,
            default_price_per_kilo: config.session.default_price_per_kilo(),
        }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteStore>> {
        self.remote.as_ref()
    }

    /// Probes the remote store. False when none is configured.
    pub async fn is_remote_reachable(&self) -> bool {
        match &self.remote {
            Some(store) => remote::is_reachable(store.as_ref()).await,
            None => false,
        }
    }

    // =========================================================================
    // Price Cache
    // =========================================================================

    /// Caches a price-per-kilo for a PLU.
    pub async fn cache_price(
        &self,
        plu: &str,
        price_per_kilo: Money,
        product_info: Option<ProductMeta>,
    ) -> SyncResult<PriceCacheRecord> {
        Ok(self
            .local
            .price_cache()
            .put(plu, price_per_kilo, product_info)
            .await?)
    }

    /// Cached record for a PLU, regardless of age.
    pub async fn cached_price(&self, plu: &str) -> SyncResult<Option<PriceCacheRecord>> {
        Ok(self.local.price_cache().get(plu).await?)
    }

    /// Price-per-kilo for a PLU: the fresh cached value, else the configured
    /// default.
    pub async fn lookup_price_per_kilo(&self, plu: &str) -> SyncResult<Money> {
        let fresh = self
            .local
            .price_cache()
            .get_fresh(plu, self.price_ttl_days)
            .await?;
        Ok(match fresh {
            Some(record) => record.price_per_kilo,
            None => {
                debug!(plu = %plu, "No fresh cached price, using default");
                self.default_price_per_kilo
            }
        })
    }

    /// Removes cache records at least `older_than_days` old.
    pub async fn purge_price_cache(&self, older_than_days: u32) -> SyncResult<usize> {
        Ok(self.local.price_cache().purge(older_than_days).await?)
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Writes records locally, then to the remote store or the sync queue.
    ///
    /// Only the local write can fail the commit. It is all or nothing, so an
    /// `Err` means no record was stored.
    pub async fn commit(&self, records: Vec<InventoryRecord>) -> SyncResult<CommitOutcome> {
        let mut outcome = CommitOutcome {
            stored: self.local.inventory().insert_many(&records).await?,
            ..Default::default()
        };

        let online = match &self.remote {
            Some(store) => remote::is_reachable(store.as_ref()).await.then_some(store),
            None => None,
        };

        for record in &records {
            let row = inventory_row(record);
            if let Some(store) = online {
                match store.insert(INVENTORY_TABLE, row.clone()).await {
                    Ok(_) => {
                        outcome.remote_written += 1;
                        continue;
                    }
                    Err(e) => warn!(id = %record.id, error = %e, "Remote insert failed, queuing"),
                }
            }
            match self
                .local
                .sync_queue()
                .enqueue(RemoteWrite::insert(INVENTORY_TABLE, row))
                .await
            {
                Ok(_) => outcome.queued += 1,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Record stored locally but not queued");
                    outcome.queue_failed += 1;
                }
            }
        }

        info!(
            stored = outcome.stored,
            remote = outcome.remote_written,
            queued = outcome.queued,
            queue_failed = outcome.queue_failed,
            "Commit complete"
        );
        Ok(outcome)
    }

    /// Annotates and commits a session's entries, then clears the session.
    ///
    /// The session is left untouched when the local write fails.
    pub async fn commit_session(
        &self,
        session: &mut BatchSession,
        user: Option<&str>,
        location: Option<&str>,
    ) -> SyncResult<CommitOutcome> {
        let mut records = session.to_records(user, location, chrono::Utc::now());
        self.annotate(session.entries(), &mut records).await?;
        let outcome = self.commit(records).await?;
        session.clear();
        Ok(outcome)
    }

    /// Fills in lot numbers, notes and primary codes. `records` are the
    /// projections of `entries`, in the same order.
    async fn annotate(
        &self,
        entries: &[SessionEntry],
        records: &mut [InventoryRecord],
    ) -> SyncResult<()> {
        let online = self.is_remote_reachable().await;
        let relation = if online {
            match self.load_relations().await {
                Ok(relation) => Some(relation),
                Err(e) => {
                    warn!(error = %e, "Relations unavailable, subproducts not annotated");
                    None
                }
            }
        } else {
            None
        };

        let mut lots: HashMap<String, String> = HashMap::new();
        for (entry, record) in entries.iter().zip(records.iter_mut()) {
            let product_code = match barcode::decode(&entry.code) {
                Ok(item) => item.product_code().to_string(),
                Err(_) => entry.code.clone(),
            };

            let weighed = match entry.format {
                Some(BarcodeFormat::Code128Weighted) => {
                    let ppk = self.lookup_price_per_kilo(&product_code).await?;
                    portion_grams(entry.unit_price, ppk).map(|grams| (grams, ppk))
                }
                _ => None,
            };

            if let Some(relation) = &relation {
                let classification = relation.classify(&product_code);
                if classification.kind == CodeKind::Subproduct {
                    record.primary_code = classification.primary;
                }
            }

            record.notes = record_notes(
                weighed.map(|(grams, ppk)| (product_code.as_str(), grams, ppk)),
                record.primary_code.as_deref(),
            );

            if record.lot.is_none() {
                let lot = match lots.get(&record.code) {
                    Some(lot) => lot.clone(),
                    None => {
                        let lot = self.next_lot(&record.code, online).await;
                        lots.insert(record.code.clone(), lot.clone());
                        lot
                    }
                };
                record.lot = Some(lot);
            }
        }
        Ok(())
    }

    /// Next lot number for `code`: the highest numeric remote `lote` plus
    /// one, or [`FIRST_LOT`] when there is none or the remote cannot answer.
    pub async fn next_lot(&self, code: &str, online: bool) -> String {
        let store = match (&self.remote, online) {
            (Some(store), true) => store,
            _ => return FIRST_LOT.to_string(),
        };

        let rows = match store
            .select(INVENTORY_TABLE, &RowFilter::all().eq("codigo", code))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(code = %code, error = %e, "Lot lookup failed, starting at 1");
                return FIRST_LOT.to_string();
            }
        };

        rows.iter()
            .filter_map(|row| text_field(row, "lote")?.parse::<u64>().ok())
            .max()
            .map(|highest| (highest + 1).to_string())
            .unwrap_or_else(|| FIRST_LOT.to_string())
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Every locally committed record, synced or not.
    pub async fn records(&self) -> SyncResult<Vec<InventoryRecord>> {
        Ok(self.local.inventory().list().await?)
    }

    /// Renders every local record in `format`.
    ///
    /// ## Formats
    /// - `Json`: the records as a JSON array
    /// - `Csv`: `code,name,brand,quantity,unit,date,location`
    /// - anything else: [`SyncError::Unimplemented`]
    pub async fn export_all(&self, format: &ExportFormat) -> SyncResult<String> {
        match format {
            ExportFormat::Json | ExportFormat::Csv => {}
            other => {
                return Err(SyncError::Unimplemented {
                    format: other.name().to_string(),
                })
            }
        }

        let records = self.records().await?;
        debug!(format = format.name(), count = records.len(), "Exporting records");
        match format {
            ExportFormat::Csv => to_csv(&records),
            _ => Ok(serde_json::to_string_pretty(&records)?),
        }
    }

    // =========================================================================
    // Backups
    // =========================================================================

    /// Snapshots every local record.
    pub async fn create_backup(&self) -> SyncResult<BackupSummary> {
        let records = self.records().await?;
        Ok(self.local.backups().create(records).await?)
    }

    /// The snapshot written at `created_at`.
    pub async fn restore(
        &self,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> SyncResult<BackupSnapshot> {
        let snapshot = self.local.backups().restore(created_at).await?;
        info!(created_at = %created_at, records = snapshot.records.len(), "Backup restored");
        Ok(snapshot)
    }

    /// The newest snapshot, if any.
    pub async fn restore_latest(&self) -> SyncResult<Option<BackupSnapshot>> {
        Ok(self.local.backups().latest().await?)
    }

    /// Stored backups, newest first.
    pub async fn list_backups(&self) -> SyncResult<Vec<BackupSummary>> {
        Ok(self.local.backups().list().await?)
    }

    /// Deletes backups strictly older than `older_than_days`.
    pub async fn prune_backups(&self, older_than_days: u32) -> SyncResult<usize> {
        Ok(self.local.backups().prune(older_than_days).await?)
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Reads the primary/subproduct table and builds the relation map.
    pub async fn load_relations(&self) -> SyncResult<ProductRelation> {
        let remote = self.remote.as_ref().ok_or(SyncError::RemoteNotConfigured)?;
        let rows = remote.select(RELATIONS_TABLE, &RowFilter::all()).await?;

        let pairs: Vec<RelationRow> = rows
            .iter()
            .filter_map(|row| {
                let primary = text_field(row, "principalproductid")?;
                let subproduct = text_field(row, "subproductid")?;
                Some(RelationRow::new(primary, subproduct))
            })
            .collect();

        if pairs.len() < rows.len() {
            warn!(
                skipped = rows.len() - pairs.len(),
                "Relation rows without both codes were skipped"
            );
        }

        let relation = ProductRelation::build(pairs);
        info!(primaries = relation.len(), "Loaded product relations");
        Ok(relation)
    }
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("remote", &self.remote.is_some())
            .field("price_ttl_days", &self.price_ttl_days)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Projections
// =============================================================================

/// The remote `inventario` row for a record.
pub fn inventory_row(record: &InventoryRecord) -> Value {
    json!({
        "id": record.id,
        "codigo": record.code,
        "variante": record.variant,
        "nombre": record.name,
        "marca": record.brand,
        "categoria": record.category,
        "unidad": record.unit,
        "cantidad": record.quantity,
        "precio": record.unit_price.to_decimal_string(),
        "lote": record.lot,
        "comentarios": record.notes,
        "ubicacion": record.location,
        "usuario": record.user,
        "fecha_registro": record.recorded_at.to_rfc3339(),
        "sesion_lote": record.batch_id,
        "producto_primario": record.primary_code,
    })
}

/// Codes may arrive as text or numbers.
fn text_field(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Commit notes for a record, `None` when there is nothing to say.
///
/// `weighed` is `(plu, grams, price_per_kilo)`.
fn record_notes(weighed: Option<(&str, i64, Money)>, primary: Option<&str>) -> Option<String> {
    let mut notes = Vec::new();
    if let Some((plu, grams, ppk)) = weighed {
        notes.push(format!("Weighed item, PLU {}", plu));
        notes.push(format!("{}.{:03} kg @ {}/kg", grams / 1000, grams % 1000, ppk));
    }
    if let Some(primary) = primary {
        notes.push(format!("Subproduct of {}", primary));
    }
    (!notes.is_empty()).then(|| notes.join(" | "))
}

fn to_csv(records: &[InventoryRecord]) -> SyncResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records {
        let quantity = record.quantity.to_string();
        let date = record.recorded_at.format("%Y-%m-%d").to_string();
        writer.write_record([
            record.code.as_str(),
            record.name.as_str(),
            record.brand.as_deref().unwrap_or(""),
            quantity.as_str(),
            record.unit.as_str(),
            date.as_str(),
            record.location.as_deref().unwrap_or(""),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| SyncError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SyncError::Export(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemoteStore;
    use chrono::{Duration, TimeZone, Utc};
    use scanlot_db::{DbError, MemoryKvStore};

    fn record(code: &str, name: &str) -> InventoryRecord {
        InventoryRecord {
            id: format!("id-{}", code),
            code: code.to_string(),
            variant: String::new(),
            name: name.to_string(),
            brand: Some("Acme".to_string()),
            category: None,
            unit: "pz".to_string(),
            quantity: 2,
            unit_price: Money::from_cents(1050),
            lot: None,
            notes: None,
            location: Some("Bodega, pasillo 3".to_string()),
            user: Some("ana".to_string()),
            recorded_at: Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap(),
            batch_id: None,
            primary_code: None,
        }
    }

    fn online() -> (PersistenceGateway, Arc<InMemoryRemoteStore>) {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let gateway = PersistenceGateway::new(LocalStore::in_memory(), Some(remote.clone()));
        (gateway, remote)
    }

    #[tokio::test]
    async fn test_commit_online_writes_remote() {
        let (gateway, remote) = online();

        let outcome = gateway
            .commit(vec![record("750100", "Leche"), record("750200", "Pan")])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CommitOutcome { stored: 2, remote_written: 2, queued: 0, queue_failed: 0 }
        );
        assert!(outcome.is_fully_synced());
        let rows = remote.rows(INVENTORY_TABLE).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["codigo"], "750100");
        assert_eq!(rows[0]["precio"], "10.50");
        assert!(gateway.local().sync_queue().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_offline_queues_and_succeeds() {
        let (gateway, remote) = online();
        remote.set_reachable(false);

        let outcome = gateway.commit(vec![record("750100", "Leche")]).await.unwrap();

        assert_eq!(
            outcome,
            CommitOutcome { stored: 1, remote_written: 0, queued: 1, queue_failed: 0 }
        );
        assert_eq!(gateway.local().sync_queue().len().await.unwrap(), 1);
        assert_eq!(gateway.records().await.unwrap().len(), 1);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_without_remote_queues() {
        let gateway = PersistenceGateway::new(LocalStore::in_memory(), None);
        let outcome = gateway.commit(vec![record("1", "a")]).await.unwrap();
        assert_eq!(outcome.queued, 1);
        assert!(!gateway.is_remote_reachable().await);
    }

    #[tokio::test]
    async fn test_rejected_row_is_queued_others_written() {
        let (gateway, remote) = online();
        remote.fail_rows_where("codigo", "bad");

        let outcome = gateway
            .commit(vec![record("good", "a"), record("bad", "b")])
            .await
            .unwrap();

        assert_eq!(outcome.remote_written, 1);
        assert_eq!(outcome.queued, 1);
        let queued = gateway.local().sync_queue().list().await.unwrap();
        assert_eq!(queued[0].payload.row["codigo"], "bad");
    }

    #[tokio::test]
    async fn test_commit_session_clears_it() {
        let (gateway, _remote) = online();
        let mut session = BatchSession::default();
        let item = barcode::decode("283100000391746").unwrap();
        session
            .add_entry(&item, &ProductMeta::new("Jamón", "kg"), 2)
            .unwrap();

        let outcome = gateway
            .commit_session(&mut session, Some("ana"), Some("A1"))
            .await
            .unwrap();

        assert_eq!(outcome.stored, 1);
        assert!(session.is_empty());
        let stored = gateway.records().await.unwrap();
        assert_eq!(stored[0].quantity, 2);
        assert_eq!(stored[0].user.as_deref(), Some("ana"));
    }

    #[tokio::test]
    async fn test_queue_failure_after_local_write_still_commits() {
        // Room for the inventory counter and one record, nothing for the queue
        let local = LocalStore::new(Arc::new(MemoryKvStore::with_capacity(2)));
        let gateway = PersistenceGateway::new(local, None);
        let mut session = BatchSession::default();
        session
            .add_manual("ABC-12345", &ProductMeta::new("Tornillo", "pz"), 1, Money::from_cents(250))
            .unwrap();

        let outcome = gateway
            .commit_session(&mut session, None, None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CommitOutcome { stored: 1, remote_written: 0, queued: 0, queue_failed: 1 }
        );
        assert!(!outcome.is_fully_synced());
        assert!(session.is_empty());
        assert_eq!(gateway.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_local_write_keeps_session_and_stores_nothing() {
        let local = LocalStore::new(Arc::new(MemoryKvStore::with_capacity(2)));
        let gateway = PersistenceGateway::new(local, None);
        let mut session = BatchSession::default();
        let meta = ProductMeta::new("Tornillo", "pz");
        session.add_manual("ABC-12345", &meta, 1, Money::from_cents(250)).unwrap();
        session.add_manual("XYZ-98765", &meta, 1, Money::from_cents(250)).unwrap();

        let err = gateway
            .commit_session(&mut session, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Database(DbError::QuotaExceeded(_))));
        assert_eq!(session.len(), 2);
        assert!(gateway.records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_session_annotates_records() {
        let (gateway, remote) = online();
        remote
            .seed(
                INVENTORY_TABLE,
                vec![
                    json!({ "codigo": "4006381333931", "lote": "4" }),
                    json!({ "codigo": "4006381333931", "lote": 7 }),
                    json!({ "codigo": "4006381333931", "lote": "sin lote" }),
                ],
            )
            .await;
        remote
            .seed(
                RELATIONS_TABLE,
                vec![json!({ "principalproductid": "4006381333931", "subproductid": "96385074" })],
            )
            .await;
        gateway
            .cache_price("8310", Money::from_cents(10000), None)
            .await
            .unwrap();

        let mut session = BatchSession::default();
        let priced = |name: &str| ProductMeta::new(name, "pz").with_price(Money::from_cents(1500));
        session
            .add_entry(
                &barcode::decode("283100000391746").unwrap(),
                &ProductMeta::new("Jamón", "kg"),
                1,
            )
            .unwrap();
        session
            .add_entry(&barcode::decode("96385074").unwrap(), &priced("Lata"), 1)
            .unwrap();
        let primary = barcode::decode("4006381333931").unwrap();
        session
            .add_entry(&primary, &priced("Caja").with_variant("chica"), 1)
            .unwrap();
        session
            .add_entry(&primary, &priced("Caja").with_variant("grande"), 1)
            .unwrap();

        gateway
            .commit_session(&mut session, Some("ana"), None)
            .await
            .unwrap();
        let stored = gateway.records().await.unwrap();

        assert_eq!(
            stored[0].notes.as_deref(),
            Some("Weighed item, PLU 8310 | 0.392 kg @ $100.00/kg")
        );
        assert_eq!(stored[0].lot.as_deref(), Some("1"));
        assert_eq!(stored[0].primary_code, None);

        assert_eq!(stored[1].primary_code.as_deref(), Some("4006381333931"));
        assert_eq!(stored[1].notes.as_deref(), Some("Subproduct of 4006381333931"));

        assert_eq!(stored[2].lot.as_deref(), Some("8"));
        assert_eq!(stored[3].lot.as_deref(), Some("8"));
        assert_eq!(stored[2].notes, None);

        assert!(stored[0].batch_id.is_some());
        assert!(stored.iter().all(|r| r.batch_id == stored[0].batch_id));
        let rows = remote.rows(INVENTORY_TABLE).await;
        assert_eq!(rows.last().unwrap()["lote"], "8");
        assert_eq!(rows.last().unwrap()["sesion_lote"], json!(stored[0].batch_id));
    }

    #[tokio::test]
    async fn test_offline_lots_start_at_one() {
        let (gateway, remote) = online();
        remote
            .seed(INVENTORY_TABLE, vec![json!({ "codigo": "4006381333931", "lote": "4" })])
            .await;
        remote.set_reachable(false);

        assert_eq!(gateway.next_lot("4006381333931", true).await, FIRST_LOT);
        assert_eq!(gateway.next_lot("4006381333931", false).await, FIRST_LOT);

        remote.set_reachable(true);
        assert_eq!(gateway.next_lot("4006381333931", true).await, "5");
        assert_eq!(gateway.next_lot("unknown", true).await, FIRST_LOT);
    }

    #[test]
    fn test_record_notes() {
        assert_eq!(record_notes(None, None), None);
        assert_eq!(
            record_notes(Some(("0042", 1250, Money::from_cents(8000))), Some("P1")).as_deref(),
            Some("Weighed item, PLU 0042 | 1.250 kg @ $80.00/kg | Subproduct of P1")
        );
    }

    #[tokio::test]
    async fn test_export_json_and_csv() {
        let gateway = PersistenceGateway::new(LocalStore::in_memory(), None);
        gateway.commit(vec![record("750100", "Leche")]).await.unwrap();

        let json = gateway.export_all(&ExportFormat::Json).await.unwrap();
        let parsed: Vec<InventoryRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![record("750100", "Leche")]);

        let csv = gateway.export_all(&ExportFormat::Csv).await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("code,name,brand,quantity,unit,date,location"));
        assert_eq!(
            lines.next(),
            Some("750100,Leche,Acme,2,pz,2026-10-17,\"Bodega, pasillo 3\"")
        );
    }

    #[tokio::test]
    async fn test_export_unknown_format_is_unimplemented() {
        let gateway = PersistenceGateway::new(LocalStore::in_memory(), None);

        for format in [ExportFormat::Xlsx, ExportFormat::parse("pdf")] {
            let err = gateway.export_all(&format).await.unwrap_err();
            assert!(
                matches!(err, SyncError::Unimplemented { ref format } if format == "xlsx" || format == "pdf")
            );
        }
    }

    #[tokio::test]
    async fn test_backup_round_trip() {
        let gateway = PersistenceGateway::new(LocalStore::in_memory(), None);
        gateway
            .commit(vec![record("1", "a"), record("2", "b")])
            .await
            .unwrap();
        let exported = gateway.export_all(&ExportFormat::Json).await.unwrap();

        let summary = gateway.create_backup().await.unwrap();
        gateway.commit(vec![record("3", "c")]).await.unwrap();

        let restored = gateway.restore(summary.created_at).await.unwrap();
        let at_backup: Vec<InventoryRecord> = serde_json::from_str(&exported).unwrap();
        assert_eq!(restored.records, at_backup);

        let latest = gateway.restore_latest().await.unwrap().unwrap();
        assert_eq!(latest, restored);
        assert_eq!(gateway.list_backups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_backups_keeps_recent() {
        let gateway = PersistenceGateway::new(LocalStore::in_memory(), None);
        gateway
            .local()
            .backups()
            .create_at(vec![], Utc::now() - Duration::days(10))
            .await
            .unwrap();
        gateway.create_backup().await.unwrap();

        assert_eq!(gateway.prune_backups(7).await.unwrap(), 1);
        assert_eq!(gateway.list_backups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_lookup_falls_back_to_default() {
        let gateway = PersistenceGateway::new(LocalStore::in_memory(), None);
        assert_eq!(
            gateway.lookup_price_per_kilo("8310").await.unwrap(),
            Money::from_cents(10_000)
        );

        gateway
            .cache_price("8310", Money::from_cents(12_990), None)
            .await
            .unwrap();
        assert_eq!(
            gateway.lookup_price_per_kilo("8310").await.unwrap(),
            Money::from_cents(12_990)
        );
        assert!(gateway.cached_price("8310").await.unwrap().is_some());
        assert_eq!(gateway.purge_price_cache(0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_relations() {
        let (gateway, remote) = online();
        remote
            .seed(
                RELATIONS_TABLE,
                vec![
                    json!({ "principalproductid": "P1", "subproductid": "S1" }),
                    json!({ "principalproductid": "P1", "subproductid": "S2" }),
                    json!({ "principalproductid": 42, "subproductid": "S3" }),
                    json!({ "principalproductid": "P2" }),
                ],
            )
            .await;

        let relation = gateway.load_relations().await.unwrap();

        assert_eq!(relation.len(), 2);
        assert_eq!(relation.subproducts_of("P1"), ["S1", "S2"]);
        let classified = relation.classify("S3");
        assert_eq!(classified.kind, CodeKind::Subproduct);
        assert_eq!(classified.primary.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_load_relations_without_remote() {
        let gateway = PersistenceGateway::new(LocalStore::in_memory(), None);
        let err = gateway.load_relations().await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteNotConfigured));
    }
}
