//! # scanlot-core: Pure Scanning Logic
//!
//! This crate is the **heart** of the batch scanning pipeline. It contains
//! decoding, relation lookup and session bookkeeping as pure code with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scanlot Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Scanner UI / CLI (external collaborators)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ raw scan strings                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ scanlot-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  barcode  │  │ relation  │  │  session  │  │ validation│  │   │
//! │  │   │  decode   │  │ classify  │  │ add/remove│  │  reports  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ❌ NO: Database, Network, File I/O, Async                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          scanlot-db (local store) / scanlot-sync (remote)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//! ```rust
//! use scanlot_core::{barcode, BatchSession, ProductMeta};
//!
//! let mut session = BatchSession::default();
//! let item = barcode::decode("283100000391746").unwrap();
//! session.add_entry(&item, &ProductMeta::new("Jamón", "kg"), 1).unwrap();
//! session.add_entry(&item, &ProductMeta::new("Jamón", "kg"), 1).unwrap();
//!
//! assert_eq!(session.len(), 1);
//! assert_eq!(session.totals().total_value.cents(), 2 * 3917);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod barcode;
pub mod error;
pub mod money;
pub mod relation;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, DecodeError, ErrorCode, ValidationError};
pub use money::Money;
pub use relation::{Classification, CodeKind, ProductRelation, RelationRow};
pub use session::BatchSession;
pub use types::*;
pub use validation::{SessionRules, ValidationIssue, ValidationReport};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single session entry.
///
/// ## Business Reason
/// Catches a quantity typed with an extra digit. Overridable through
/// [`SessionRules`].
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Remote table holding committed inventory rows.
pub const INVENTORY_TABLE: &str = "inventario";

/// Remote table holding product catalogue rows; probed for connectivity.
pub const PRODUCTS_TABLE: &str = "productos";

/// Remote table holding primary/subproduct pairs.
pub const RELATIONS_TABLE: &str = "productos_subproductos";
