//! # Batch Session
//!
//! The mutable, ordered collection of validated entries for one scanning
//! session.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BatchSession Lifecycle                           │
//! │                                                                         │
//! │  scanner UI opens ──► BatchSession::new(rules)                         │
//! │                             │                                           │
//! │          ┌──────────────────┼──────────────────┐                        │
//! │          ▼                  ▼                  ▼                        │
//! │     add_entry()        remove_at()       update_quantity()             │
//! │     add_manual()                                                       │
//! │          │  same (code, variant)? ──► quantity += qty                   │
//! │          │  otherwise            ──► append                             │
//! │          ▼                                                              │
//! │     totals()  ← recomputed on every call                               │
//! │          │                                                              │
//! │          ▼                                                              │
//! │     to_records() ──► gateway commit ──► clear()                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A session is never persisted mid-way except when a front-end chooses to
//! serialize it (it derives serde for that purpose).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    BarcodeFormat, DecodedItem, InventoryRecord, ProductMeta, Provenance, SessionEntry,
    SessionTotals,
};
use crate::validation::{
    validate_code, validate_code_format, validate_name, validate_price, validate_quantity,
    SessionRules, ValidationReport, ValidationResult,
};

/// An in-memory batch of scanned items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSession {
    entries: Vec<SessionEntry>,
    rules: SessionRules,
}

impl BatchSession {
    /// Creates an empty session governed by `rules`.
    pub fn new(rules: SessionRules) -> Self {
        BatchSession {
            entries: Vec::new(),
            rules,
        }
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Adds `qty` of a decoded item.
    ///
    /// ## Variant
    /// `meta.variant` if given; for weighted labels without one, the
    /// portion price (two portions of one PLU at different prices are
    /// different lines); otherwise empty.
    ///
    /// ## Price
    /// The price printed on the label wins over the catalogue price.
    ///
    /// ## Returns
    /// The resulting entry, merged or new. The candidate is validated first
    /// and rejected with every violated rule.
    pub fn add_entry(
        &mut self,
        item: &DecodedItem,
        meta: &ProductMeta,
        qty: i64,
    ) -> CoreResult<&SessionEntry> {
        let variant = match (&meta.variant, item.format, item.unit_price) {
            (Some(variant), _, _) => variant.clone(),
            (None, BarcodeFormat::Code128Weighted, Some(price)) => price.to_decimal_string(),
            _ => String::new(),
        };
        let unit_price = item
            .unit_price
            .or(meta.unit_price)
            .unwrap_or_else(Money::zero);

        let candidate = Self::build_entry(
            &item.code,
            variant,
            meta,
            qty,
            unit_price,
            Provenance::Scanner,
            Some(item.format),
        );
        self.insert(candidate)
    }

    /// Adds a keyboard-entered code at an explicit price.
    pub fn add_manual(
        &mut self,
        code: &str,
        meta: &ProductMeta,
        qty: i64,
        unit_price: Money,
    ) -> CoreResult<&SessionEntry> {
        let variant = meta.variant.clone().unwrap_or_default();
        let candidate = Self::build_entry(
            code.trim(),
            variant,
            meta,
            qty,
            unit_price,
            Provenance::Manual,
            None,
        );
        self.insert(candidate)
    }

    /// Removes the entry at `index`, keeping the order of the rest.
    pub fn remove_at(&mut self, index: usize) -> CoreResult<SessionEntry> {
        if index >= self.entries.len() {
            return Err(CoreError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Sets the quantity of the entry at `index`.
    pub fn update_quantity(&mut self, index: usize, qty: i64) -> CoreResult<&SessionEntry> {
        let len = self.entries.len();
        let max = self.rules.max_quantity;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(CoreError::IndexOutOfRange { index, len })?;

        validate_quantity(qty, max).map_err(|e| CoreError::Validation(vec![e]))?;
        entry.quantity = qty;
        entry.recompute_subtotal();
        Ok(&*entry)
    }

    /// Empties the session. Persisted and backed-up data is untouched.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Recomputes totals over the current entries.
    pub fn totals(&self) -> SessionTotals {
        self.entries
            .iter()
            .fold(SessionTotals::default(), |mut totals, entry| {
                totals.item_count += 1;
                totals.total_quantity += entry.quantity;
                totals.total_value += entry.subtotal;
                totals
            })
    }

    /// Checks `entry` against every rule and reports all violations.
    pub fn validate(&self, entry: &SessionEntry) -> ValidationReport {
        let (report, _) = ValidationReport::collect(self.rule_results(entry));
        report
    }

    /// Projects the session into inventory records ready to commit.
    ///
    /// Every record of one projection shares a fresh `batch_id`. Lot numbers
    /// and notes are left for the committer to fill in.
    pub fn to_records(
        &self,
        user: Option<&str>,
        location: Option<&str>,
        recorded_at: DateTime<Utc>,
    ) -> Vec<InventoryRecord> {
        let batch_id = Uuid::new_v4().to_string();
        self.entries
            .iter()
            .map(|entry| InventoryRecord {
                id: Uuid::new_v4().to_string(),
                code: entry.code.clone(),
                variant: entry.variant.clone(),
                name: entry.name.clone(),
                brand: entry.brand.clone(),
                category: entry.category.clone(),
                unit: entry.unit.clone(),
                quantity: entry.quantity,
                unit_price: entry.unit_price,
                lot: None,
                notes: None,
                location: location.map(str::to_string),
                user: user.map(str::to_string),
                recorded_at,
                batch_id: Some(batch_id.clone()),
                primary_code: None,
            })
            .collect()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn build_entry(
        code: &str,
        variant: String,
        meta: &ProductMeta,
        qty: i64,
        unit_price: Money,
        provenance: Provenance,
        format: Option<BarcodeFormat>,
    ) -> SessionEntry {
        SessionEntry {
            code: code.to_string(),
            variant,
            name: meta.name.trim().to_string(),
            brand: meta.brand.clone(),
            category: meta.category.clone(),
            unit: meta.unit.clone(),
            quantity: qty,
            unit_price,
            subtotal: unit_price.multiply_quantity(qty),
            added_at: Utc::now(),
            provenance,
            format,
        }
    }

    fn insert(&mut self, candidate: SessionEntry) -> CoreResult<&SessionEntry> {
        let (report, failures) = ValidationReport::collect(self.rule_results(&candidate));
        if !report.is_valid {
            return Err(CoreError::Validation(failures));
        }

        let existing = self
            .entries
            .iter()
            .position(|e| e.matches(&candidate.code, &candidate.variant));

        let index = match existing {
            Some(index) => {
                let max = self.rules.max_quantity;
                let entry = &mut self.entries[index];
                let merged = entry.quantity + candidate.quantity;
                if merged > max {
                    return Err(CoreError::QuantityTooLarge {
                        requested: merged,
                        max,
                    });
                }
                entry.quantity = merged;
                entry.recompute_subtotal();
                debug!(
                    code = %entry.code,
                    variant = %entry.variant,
                    quantity = entry.quantity,
                    "Merged scan into existing entry"
                );
                index
            }
            None => {
                self.entries.push(candidate);
                self.entries.len() - 1
            }
        };

        Ok(&self.entries[index])
    }

    fn rule_results(&self, entry: &SessionEntry) -> [ValidationResult<()>; 5] {
        let rules = &self.rules;
        [
            validate_code(&entry.code),
            validate_name(&entry.name),
            validate_quantity(entry.quantity, rules.max_quantity),
            validate_price(entry.unit_price, rules.min_price, rules.max_price),
            match entry.format {
                Some(format) => validate_code_format(&entry.code, format),
                None => Ok(()),
            },
        ]
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::decode;
    use crate::error::ErrorCode;

    fn coke() -> ProductMeta {
        ProductMeta::new("Coca-Cola 600ml", "pz")
            .with_brand("Coca-Cola")
            .with_price(Money::from_cents(1850))
    }

    #[test]
    fn test_same_code_twice_merges() {
        let mut session = BatchSession::default();
        let item = decode("4006381333931").unwrap();

        session.add_entry(&item, &coke(), 1).unwrap();
        let entry = session.add_entry(&item, &coke(), 1).unwrap();

        assert_eq!(entry.quantity, 2);
        assert_eq!(entry.subtotal.cents(), 3700);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_different_variant_is_new_entry() {
        let mut session = BatchSession::default();
        let item = decode("4006381333931").unwrap();

        session.add_entry(&item, &coke().with_variant("lata"), 1).unwrap();
        session.add_entry(&item, &coke().with_variant("vidrio"), 1).unwrap();

        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_weighted_portions_split_by_price() {
        let mut session = BatchSession::default();
        let meta = ProductMeta::new("Jamón", "kg");

        let a = decode("283100000391746").unwrap();
        let b = decode("283100000420046").unwrap();
        session.add_entry(&a, &meta, 1).unwrap();
        session.add_entry(&a, &meta, 1).unwrap();
        session.add_entry(&b, &meta, 1).unwrap();

        assert_eq!(session.len(), 2);
        assert_eq!(session.entries()[0].variant, "39.17");
        assert_eq!(session.entries()[0].quantity, 2);
        assert_eq!(session.entries()[0].unit_price.cents(), 3917);
        assert_eq!(session.entries()[1].unit_price.cents(), 4200);
    }

    #[test]
    fn test_totals_track_mutation() {
        let mut session = BatchSession::default();
        let item = decode("4006381333931").unwrap();
        session.add_entry(&item, &coke(), 3).unwrap();
        session
            .add_manual("ABC-12345", &ProductMeta::new("Tornillo", "pz"), 2, Money::from_cents(250))
            .unwrap();

        let totals = session.totals();
        assert_eq!(totals.item_count, 2);
        assert_eq!(totals.total_quantity, 5);
        assert_eq!(totals.total_value.cents(), 3 * 1850 + 2 * 250);

        session.remove_at(0).unwrap();
        let totals = session.totals();
        assert_eq!(totals.item_count, 1);
        assert_eq!(totals.total_value.cents(), 500);

        session.clear();
        assert_eq!(session.totals(), SessionTotals::default());
    }

    #[test]
    fn test_remove_at_preserves_order() {
        let mut session = BatchSession::default();
        for code in ["AAAA-0001", "AAAA-0002", "AAAA-0003"] {
            session
                .add_manual(code, &ProductMeta::new(code, "pz"), 1, Money::from_cents(100))
                .unwrap();
        }

        let removed = session.remove_at(1).unwrap();
        assert_eq!(removed.code, "AAAA-0002");
        let codes: Vec<_> = session.entries().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["AAAA-0001", "AAAA-0003"]);

        let err = session.remove_at(2).unwrap_err();
        assert!(matches!(err, CoreError::IndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn test_validate_reports_everything() {
        let session = BatchSession::default();
        let entry = SessionEntry {
            code: String::new(),
            variant: String::new(),
            name: "  ".into(),
            brand: None,
            category: None,
            unit: "pz".into(),
            quantity: 0,
            unit_price: Money::zero(),
            subtotal: Money::zero(),
            added_at: Utc::now(),
            provenance: Provenance::Manual,
            format: None,
        };

        let report = session.validate(&entry);
        assert!(!report.is_valid);
        assert_eq!(
            report.codes(),
            vec![
                ErrorCode::MissingField,
                ErrorCode::MissingField,
                ErrorCode::OutOfRange,
                ErrorCode::OutOfRange,
            ]
        );
    }

    #[test]
    fn test_validate_format_mismatch() {
        let session = BatchSession::default();
        let item = decode("4006381333931").unwrap();
        let mut probe = BatchSession::default();
        let mut entry = probe.add_entry(&item, &coke(), 1).unwrap().clone();
        entry.code = "400638133".into();

        let report = session.validate(&entry);
        assert_eq!(report.codes(), vec![ErrorCode::FormatMismatch]);
    }

    #[test]
    fn test_add_rejects_invalid_candidate() {
        let mut session = BatchSession::default();
        let item = decode("4006381333931").unwrap();
        let no_price = ProductMeta::new("Sin precio", "pz");

        let err = session.add_entry(&item, &no_price, 1).unwrap_err();
        match err {
            CoreError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].code(), ErrorCode::OutOfRange);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(session.is_empty());
    }

    #[test]
    fn test_merge_respects_max_quantity() {
        let rules = SessionRules {
            max_quantity: 3,
            ..SessionRules::default()
        };
        let mut session = BatchSession::new(rules);
        let item = decode("4006381333931").unwrap();

        session.add_entry(&item, &coke(), 2).unwrap();
        let err = session.add_entry(&item, &coke(), 2).unwrap_err();
        assert!(matches!(err, CoreError::QuantityTooLarge { requested: 4, max: 3 }));
        assert_eq!(session.entries()[0].quantity, 2);
    }

    #[test]
    fn test_update_quantity() {
        let mut session = BatchSession::default();
        let item = decode("4006381333931").unwrap();
        session.add_entry(&item, &coke(), 1).unwrap();

        let entry = session.update_quantity(0, 4).unwrap();
        assert_eq!(entry.subtotal.cents(), 7400);
        assert!(session.update_quantity(0, 0).is_err());
        assert!(session.update_quantity(5, 1).is_err());
    }

    #[test]
    fn test_to_records() {
        let mut session = BatchSession::default();
        let item = decode("4006381333931").unwrap();
        session.add_entry(&item, &coke(), 2).unwrap();

        let now = Utc::now();
        let records = session.to_records(Some("ana"), Some("Bodega 1"), now);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "4006381333931");
        assert_eq!(records[0].quantity, 2);
        assert_eq!(records[0].location.as_deref(), Some("Bodega 1"));
        assert_eq!(records[0].recorded_at, now);
        assert!(!records[0].id.is_empty());
        assert!(records[0].lot.is_none());
    }

    #[test]
    fn test_to_records_share_one_batch_id() {
        let mut session = BatchSession::default();
        session.add_entry(&decode("4006381333931").unwrap(), &coke(), 1).unwrap();
        session
            .add_manual("ABC-12345", &ProductMeta::new("Tornillo", "pz"), 1, Money::from_cents(250))
            .unwrap();

        let first = session.to_records(None, None, Utc::now());
        let second = session.to_records(None, None, Utc::now());

        assert!(first[0].batch_id.is_some());
        assert_eq!(first[0].batch_id, first[1].batch_id);
        assert_ne!(first[0].batch_id, second[0].batch_id);
    }
}
