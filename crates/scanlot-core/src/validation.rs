//! # Validation Module
//!
//! Entry validation for batch sessions.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Aggregate, never fail fast                         │
//! │                                                                         │
//! │  validate_code ─────────┐                                              │
//! │  validate_name ─────────┤                                              │
//! │  validate_quantity ─────┼──► ValidationReport { is_valid, errors: [..] }│
//! │  validate_price ────────┤                                              │
//! │  validate_code_format ──┘                                              │
//! │                                                                         │
//! │  Each rule is a standalone fn returning ValidationResult<()>;          │
//! │  the report runs all of them and keeps every failure.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use scanlot_core::validation::{validate_quantity, validate_code};
//!
//! assert!(validate_code("7501000111206").is_ok());
//! assert!(validate_quantity(0, 999).is_err());
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::barcode::{self, GENERIC_MIN_LEN};
use crate::error::{ErrorCode, ValidationError};
use crate::money::Money;
use crate::types::BarcodeFormat;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Rules
// =============================================================================

/// Range and limit settings applied to every session entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionRules {
    pub min_price: Money,
    pub max_price: Money,
    pub max_quantity: i64,
}

impl Default for SessionRules {
    fn default() -> Self {
        SessionRules {
            min_price: Money::from_cents(1),
            max_price: Money::from_cents(9_999_999),
            max_quantity: crate::MAX_ITEM_QUANTITY,
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// One violated constraint, flattened for display and serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationIssue {
    pub code: ErrorCode,
    pub field: String,
    pub message: String,
}

impl From<&ValidationError> for ValidationIssue {
    fn from(err: &ValidationError) -> Self {
        ValidationIssue {
            code: err.code(),
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

/// Every violated constraint of one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Builds a report from the outcome of each rule.
    pub fn collect<I>(results: I) -> (Self, Vec<ValidationError>)
    where
        I: IntoIterator<Item = ValidationResult<()>>,
    {
        let failures: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();
        let report = ValidationReport {
            is_valid: failures.is_empty(),
            errors: failures.iter().map(ValidationIssue::from).collect(),
        };
        (report, failures)
    }

    /// The error codes, in rule order.
    pub fn codes(&self) -> Vec<ErrorCode> {
        self.errors.iter().map(|issue| issue.code).collect()
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a code is present.
pub fn validate_code(code: &str) -> ValidationResult<()> {
    if code.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }
    Ok(())
}

/// Validates that a product name is present.
pub fn validate_name(name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }
    Ok(())
}

/// Validates that `code` has the shape its claimed format requires.
///
/// ## Rules
/// - EAN-13 / UPC-A / EAN-8: exactly 13 / 12 / 8 digits
/// - CODE128 weighted: at least 14 digits once zero-padding is stripped
/// - Generic: at least 8 characters
///
/// An empty code is reported by [`validate_code`], not here.
pub fn validate_code_format(code: &str, format: BarcodeFormat) -> ValidationResult<()> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(());
    }

    let all_digits = code.bytes().all(|b| b.is_ascii_digit());
    let mismatch = |reason: String| {
        Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason,
        })
    };

    match format {
        BarcodeFormat::Ean13 | BarcodeFormat::UpcA | BarcodeFormat::Ean8 => {
            let expected = match format {
                BarcodeFormat::Ean13 => 13,
                BarcodeFormat::UpcA => 12,
                _ => 8,
            };
            if !all_digits || code.len() != expected {
                return mismatch(format!("{} requires {} digits", format, expected));
            }
        }
        BarcodeFormat::Code128Weighted => {
            let stripped = code.trim_start_matches('0');
            if !all_digits || stripped.len() < 14 || !stripped.starts_with('2') {
                return mismatch(format!("{} requires '2' and at least 14 digits", format));
            }
        }
        BarcodeFormat::Generic => {
            if code.len() < GENERIC_MIN_LEN {
                return mismatch(format!(
                    "{} requires at least {} characters",
                    format, GENERIC_MIN_LEN
                ));
            }
        }
    }

    if format.has_check_digit() && !barcode::check_digit_matches(code.as_bytes()) {
        return mismatch(format!("{} check digit does not match", format));
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed `max`
pub fn validate_quantity(qty: i64, max: i64) -> ValidationResult<()> {
    if qty < 1 || qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max,
            actual: qty,
        });
    }
    Ok(())
}

/// Validates a unit price against the configured `[min, max]` range.
pub fn validate_price(price: Money, min: Money, max: Money) -> ValidationResult<()> {
    if price < min || price > max {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".to_string(),
            min: min.cents(),
            max: max.cents(),
            actual: price.cents(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
