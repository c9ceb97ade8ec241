//! # Relation Resolver
//!
//! Primary ↔ subproduct code map built from the remote
//! `productos_subproductos` table.
//!
//! ```text
//!   rows (primary, sub)           ProductRelation
//!   ───────────────────           ─────────────────────────────────
//!   (A, A1)                       primaries:  A → [A1, A2]
//!   (A, A2)            build()                B → [B1]
//!   (B, B1)           ───────►    reverse:    A1 → A, A2 → A, B1 → B
//!   (A, A1)  duplicate, dropped
//!   (C, C)   self-reference, dropped
//! ```
//!
//! Classification gives "is a primary key" precedence over "appears in some
//! primary's subproduct list".

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ts_rs::TS;

/// One row of the relation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RelationRow {
    pub primary: String,
    pub subproduct: String,
}

impl RelationRow {
    pub fn new(primary: impl Into<String>, subproduct: impl Into<String>) -> Self {
        RelationRow {
            primary: primary.into(),
            subproduct: subproduct.into(),
        }
    }
}

/// How a code relates to the product hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    Primary,
    Subproduct,
    None,
}

/// Result of [`ProductRelation::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Classification {
    pub kind: CodeKind,
    /// The primary code: the code itself for `Primary`, its owner for
    /// `Subproduct`, absent for `None`.
    pub primary: Option<String>,
    /// Subproducts of `primary`, in insertion order.
    pub subproducts: Vec<String>,
}

/// Primary code → ordered set of subproduct codes, with a reverse index.
#[derive(Debug, Clone, Default)]
pub struct ProductRelation {
    primaries: HashMap<String, Vec<String>>,
    reverse: HashMap<String, String>,
}

impl ProductRelation {
    /// Builds the map in one pass over `rows`, grouping by primary code.
    ///
    /// Duplicate pairs and self-references are dropped. When a subproduct
    /// is listed under several primaries the reverse index keeps the first.
    pub fn build<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = RelationRow>,
    {
        let mut relation = ProductRelation::default();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for row in rows {
            let primary = row.primary.trim();
            let subproduct = row.subproduct.trim();
            if primary.is_empty() || subproduct.is_empty() || primary == subproduct {
                continue;
            }
            if !seen.insert((primary.to_string(), subproduct.to_string())) {
                continue;
            }

            relation
                .primaries
                .entry(primary.to_string())
                .or_default()
                .push(subproduct.to_string());
            relation
                .reverse
                .entry(subproduct.to_string())
                .or_insert_with(|| primary.to_string());
        }

        relation
    }

    /// Classifies `code`. Primary membership is checked first.
    pub fn classify(&self, code: &str) -> Classification {
        let code = code.trim();

        if let Some(subproducts) = self.primaries.get(code) {
            return Classification {
                kind: CodeKind::Primary,
                primary: Some(code.to_string()),
                subproducts: subproducts.clone(),
            };
        }

        if let Some(primary) = self.reverse.get(code) {
            return Classification {
                kind: CodeKind::Subproduct,
                primary: Some(primary.clone()),
                subproducts: self.subproducts_of(primary).to_vec(),
            };
        }

        Classification {
            kind: CodeKind::None,
            primary: None,
            subproducts: Vec::new(),
        }
    }

    /// Subproducts of a primary code, empty if unknown.
    pub fn subproducts_of(&self, primary: &str) -> &[String] {
        self.primaries
            .get(primary)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_primary(&self, code: &str) -> bool {
        self.primaries.contains_key(code)
    }

    /// Number of primary codes.
    pub fn len(&self) -> usize {
        self.primaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProductRelation {
        ProductRelation::build(vec![
            RelationRow::new("A", "A1"),
            RelationRow::new("A", "A2"),
            RelationRow::new("B", "B1"),
            RelationRow::new("A", "A1"),
            RelationRow::new("C", "C"),
        ])
    }

    #[test]
    fn test_build_groups_and_dedups() {
        let relation = sample();
        assert_eq!(relation.len(), 2);
        assert_eq!(relation.subproducts_of("A"), ["A1", "A2"]);
        assert_eq!(relation.subproducts_of("B"), ["B1"]);
        assert!(!relation.is_primary("C"));
    }

    #[test]
    fn test_classify_primary_and_subproduct() {
        let relation = sample();

        let primary = relation.classify("A");
        assert_eq!(primary.kind, CodeKind::Primary);
        assert_eq!(primary.primary.as_deref(), Some("A"));
        assert_eq!(primary.subproducts, vec!["A1", "A2"]);

        let sub = relation.classify("A2");
        assert_eq!(sub.kind, CodeKind::Subproduct);
        assert_eq!(sub.primary.as_deref(), Some("A"));

        let none = relation.classify("Z");
        assert_eq!(none.kind, CodeKind::None);
        assert!(none.primary.is_none());
        assert!(none.subproducts.is_empty());
    }

    #[test]
    fn test_primary_takes_precedence() {
        // B is nested under A and is also a primary in its own right
        let relation = ProductRelation::build(vec![
            RelationRow::new("A", "B"),
            RelationRow::new("B", "B1"),
        ]);

        let c = relation.classify("B");
        assert_eq!(c.kind, CodeKind::Primary);
        assert_eq!(c.primary.as_deref(), Some("B"));
        assert_eq!(c.subproducts, vec!["B1"]);
    }

    #[test]
    fn test_first_primary_wins_in_reverse_index() {
        let relation = ProductRelation::build(vec![
            RelationRow::new("A", "S"),
            RelationRow::new("B", "S"),
        ]);
        assert_eq!(relation.classify("S").primary.as_deref(), Some("A"));
        assert_eq!(relation.subproducts_of("B"), ["S"]);
    }
}
