//! # Domain Types
//!
//! Core domain types used throughout the scanning pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  DecodedItem    │   │  SessionEntry   │   │ InventoryRecord │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code           │──►│  code, variant  │──►│  id (UUID)      │       │
//! │  │  plu            │   │  quantity       │   │  code, name     │       │
//! │  │  unit_price     │   │  unit_price     │   │  quantity, unit │       │
//! │  │  format         │   │  provenance     │   │  location       │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │        transient          session-owned               │ committed      │
//! │                                                        ▼                │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │PriceCacheRecord │   │ BackupSnapshot  │   │  SyncQueueItem  │       │
//! │  │  plu → ppk      │   │  created_at     │   │  RemoteWrite    │       │
//! │  │  + timestamp    │   │  records        │   │  retry_count    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Barcode Format
// =============================================================================

/// The symbology a raw scan was decoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarcodeFormat {
    /// Scale label: marker `2`, 4-digit PLU, 6+2 digit price, check suffix.
    #[serde(rename = "CODE128_WEIGHTED")]
    Code128Weighted,
    Ean13,
    Ean8,
    UpcA,
    /// Free-form alphanumeric code (CODE-128 without structure).
    Generic,
}

impl BarcodeFormat {
    /// Whether codes of this format carry a mod-10 check digit.
    pub fn has_check_digit(&self) -> bool {
        matches!(
            self,
            BarcodeFormat::Ean13 | BarcodeFormat::Ean8 | BarcodeFormat::UpcA
        )
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarcodeFormat::Code128Weighted => "CODE128_WEIGHTED",
            BarcodeFormat::Ean13 => "EAN13",
            BarcodeFormat::Ean8 => "EAN8",
            BarcodeFormat::UpcA => "UPCA",
            BarcodeFormat::Generic => "GENERIC",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Decoded Item
// =============================================================================

/// A structured item produced from one raw scan. Immutable once produced.
///
/// `plu`, `unit_price` and `check_suffix` are only present for
/// [`BarcodeFormat::Code128Weighted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DecodedItem {
    /// The trimmed raw input.
    pub code: String,
    pub format: BarcodeFormat,
    pub plu: Option<String>,
    pub unit_price: Option<Money>,
    pub check_suffix: Option<String>,
    pub check_digit_valid: bool,
}

impl DecodedItem {
    /// The code catalogue and relation lookups use: the PLU for a weighted
    /// label, the scanned code otherwise.
    pub fn product_code(&self) -> &str {
        match (&self.format, &self.plu) {
            (BarcodeFormat::Code128Weighted, Some(plu)) => plu,
            _ => &self.code,
        }
    }
}

// =============================================================================
// Product Metadata
// =============================================================================

/// Catalogue data attached to a scanned code before it enters a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductMeta {
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    /// Unit of measure ("pz", "kg", ...).
    pub unit: String,
    /// Catalogue price for items whose barcode carries none.
    pub unit_price: Option<Money>,
    /// Distinguishes otherwise identical codes (size, lot, portion price).
    pub variant: Option<String>,
}

impl ProductMeta {
    /// Creates metadata with a name and unit, everything else empty.
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        ProductMeta {
            name: name.into(),
            unit: unit.into(),
            ..Default::default()
        }
    }

    /// Sets the catalogue price.
    pub fn with_price(mut self, price: Money) -> Self {
        self.unit_price = Some(price);
        self
    }

    /// Sets the brand.
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Sets the variant.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }
}

// =============================================================================
// Session Entry
// =============================================================================

/// Where a session entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Scanner,
    Manual,
}

/// One line of a batch session. Uniqueness key = (code, variant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionEntry {
    pub code: String,
    pub variant: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Always `unit_price × quantity`.
    pub subtotal: Money,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
    pub provenance: Provenance,
    /// Format the code was decoded as; `None` for manual entries.
    pub format: Option<BarcodeFormat>,
}

impl SessionEntry {
    /// Returns true if this entry has the given uniqueness key.
    pub fn matches(&self, code: &str, variant: &str) -> bool {
        self.code == code && self.variant == variant
    }

    pub(crate) fn recompute_subtotal(&mut self) {
        self.subtotal = self.unit_price.multiply_quantity(self.quantity);
    }
}

/// Aggregate totals over a session. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionTotals {
    /// Number of distinct entries.
    pub item_count: usize,
    /// Sum of quantities across entries.
    pub total_quantity: i64,
    pub total_value: Money,
}

// =============================================================================
// Inventory Record
// =============================================================================

/// A committed inventory line. Written locally first, then to the remote
/// `inventario` table directly or through the sync queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryRecord {
    pub id: String,
    pub code: String,
    pub variant: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Per-code lot number, assigned at commit.
    pub lot: Option<String>,
    /// Generated commit notes (weight, PLU, primary product).
    pub notes: Option<String>,
    pub location: Option<String>,
    pub user: Option<String>,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
    /// Shared by every record of one committed session.
    #[serde(default)]
    pub batch_id: Option<String>,
    /// Primary product code when this record is a subproduct.
    #[serde(default)]
    pub primary_code: Option<String>,
}

// =============================================================================
// Price Cache
// =============================================================================

/// Locally cached price-per-kilo for a PLU. Most recent write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceCacheRecord {
    pub plu: String,
    pub price_per_kilo: Money,
    pub product_info: Option<ProductMeta>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Backups
// =============================================================================

/// A timestamped full export of local inventory records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BackupSnapshot {
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub records: Vec<InventoryRecord>,
}

/// Listing view of a stored backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BackupSummary {
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
}

// =============================================================================
// Export Format
// =============================================================================

/// Requested projection for `export_all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
    /// Anything else a caller asked for, kept so it can be reported by name.
    Other(String),
}

impl ExportFormat {
    /// Parses a format name. Unknown names become [`ExportFormat::Other`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => ExportFormat::Json,
            "csv" => ExportFormat::Csv,
            "xlsx" | "excel" => ExportFormat::Xlsx,
            other => ExportFormat::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Other(name) => name,
        }
    }
}

// =============================================================================
// Remote Writes & Sync Queue
// =============================================================================

/// Kind of remote mutation a queued write performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOp {
    Insert,
    Update,
    Upsert,
    Delete,
}

/// Equality filter over remote rows, optionally limited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowFilter {
    pub eq: Vec<(String, serde_json::Value)>,
    pub limit: Option<usize>,
}

impl RowFilter {
    /// Matches every row.
    pub fn all() -> Self {
        RowFilter::default()
    }

    /// Adds an equality condition.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.eq.push((column.into(), value.into()));
        self
    }

    /// Limits the number of returned rows.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Returns true if `row` satisfies every equality condition.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        self.eq
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }
}

/// A remote mutation, as replayed by the sync coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteWrite {
    pub table: String,
    pub op: WriteOp,
    pub row: serde_json::Value,
    /// Target rows for `Update` / `Delete`; `Upsert` uses it as the conflict key.
    pub filter: Option<RowFilter>,
}

impl RemoteWrite {
    /// An insert of `row` into `table`.
    pub fn insert(table: impl Into<String>, row: serde_json::Value) -> Self {
        RemoteWrite {
            table: table.into(),
            op: WriteOp::Insert,
            row,
            filter: None,
        }
    }
}

/// Status of a queued write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Failed,
}

/// A remote write waiting for connectivity.
///
/// `id` is the queue sequence number; replay order is ascending `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: u64,
    pub payload: RemoteWrite,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
    pub status: QueueItemStatus,
    pub last_error: Option<String>,
}

/// Queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub failed: usize,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_format_parse() {
        assert_eq!(ExportFormat::parse("JSON"), ExportFormat::Json);
        assert_eq!(ExportFormat::parse(" csv "), ExportFormat::Csv);
        assert_eq!(ExportFormat::parse("xlsx"), ExportFormat::Xlsx);
        assert_eq!(
            ExportFormat::parse("pdf"),
            ExportFormat::Other("pdf".into())
        );
        assert_eq!(ExportFormat::parse("pdf").name(), "pdf");
    }

    #[test]
    fn test_row_filter_matches() {
        let row = json!({ "codigo": "8310", "cantidad": 2 });

        assert!(RowFilter::all().matches(&row));
        assert!(RowFilter::all().eq("codigo", "8310").matches(&row));
        assert!(!RowFilter::all().eq("codigo", "9999").matches(&row));
        assert!(!RowFilter::all().eq("missing", 1).matches(&row));
    }

    #[test]
    fn test_product_code_prefers_plu_for_weighted_labels() {
        let mut item = DecodedItem {
            code: "283100000391746".to_string(),
            format: BarcodeFormat::Code128Weighted,
            plu: Some("8310".to_string()),
            unit_price: Some(Money::from_cents(3917)),
            check_suffix: Some("46".to_string()),
            check_digit_valid: false,
        };
        assert_eq!(item.product_code(), "8310");

        item.format = BarcodeFormat::Generic;
        item.plu = None;
        assert_eq!(item.product_code(), "283100000391746");
    }

    #[test]
    fn test_barcode_format_serde_names() {
        let json = serde_json::to_string(&BarcodeFormat::Code128Weighted).unwrap();
        assert_eq!(json, "\"CODE128_WEIGHTED\"");
        let json = serde_json::to_string(&BarcodeFormat::UpcA).unwrap();
        assert_eq!(json, "\"UPC_A\"");
        assert!(BarcodeFormat::Ean8.has_check_digit());
        assert!(!BarcodeFormat::Generic.has_check_digit());
    }
}
