//! # Error Types
//!
//! Domain-specific error types for scanlot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  scanlot-core errors (this file)                                       │
//! │  ├── DecodeError      - A raw scan could not be turned into an item    │
//! │  ├── ValidationError  - One violated entry constraint                  │
//! │  └── CoreError        - Session operation failures                     │
//! │                                                                         │
//! │  scanlot-db errors (separate crate)                                    │
//! │  └── DbError          - Local store failures                           │
//! │                                                                         │
//! │  scanlot-sync errors (separate crate)                                  │
//! │  └── SyncError        - Remote / queue / export failures               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decode and validation errors are values, not panics: a batch of scans is
//! decoded in one pass and every failure is reported together.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Decode Error
// =============================================================================

/// Why a raw scan could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeError {
    /// Input matches none of the supported symbologies.
    ///
    /// ## When This Occurs
    /// - Empty input
    /// - Shorter than 8 characters and not a retail symbology
    /// - Characters outside `[A-Za-z0-9-]`
    #[error("Unrecognized barcode: '{code}'")]
    NotRecognized { code: String },

    /// A weighted label ran out of digits before every field was read.
    #[error("Barcode '{code}' is too short for its format: needs {required} digits, has {actual}")]
    InvalidLength {
        code: String,
        required: usize,
        actual: usize,
    },

    /// Retail symbology whose embedded check digit does not match.
    #[error("Invalid check digit in '{code}': expected {expected}, found {found}")]
    InvalidCheckDigit {
        code: String,
        expected: u8,
        found: u8,
    },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Category of a violated entry constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingField,
    OutOfRange,
    FormatMismatch,
}

/// Input validation errors.
///
/// Each variant maps onto exactly one [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    /// Value does not match the shape its declared format requires.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Returns the category code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::Required { .. } => ErrorCode::MissingField,
            ValidationError::OutOfRange { .. } => ErrorCode::OutOfRange,
            ValidationError::InvalidFormat { .. } => ErrorCode::FormatMismatch,
        }
    }

    /// Returns the name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Session operation errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Index does not address an entry in the session.
    ///
    /// ## When This Occurs
    /// - `remove_at` / `update_quantity` after the list was cleared
    /// - A stale index from a UI that has not re-rendered
    #[error("Index {index} out of range for session of {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    /// Merging into an existing entry would exceed the allowed quantity.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// The candidate entry violates one or more constraints.
    #[error("Entry rejected: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Validation(Vec<ValidationError>),

    /// The raw scan could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
