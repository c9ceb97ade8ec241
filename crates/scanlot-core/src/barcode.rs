//! # Barcode Decoder
//!
//! Turns a raw scanned string into a [`DecodedItem`] or a [`DecodeError`].
//! Pure and deterministic: no I/O, no clocks, no allocation beyond the
//! result.
//!
//! ## Decode Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         decode(raw)                                     │
//! │                                                                         │
//! │  trim ──► strip leading zeros                                          │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  1. CODE128 weighted?  starts with '2', ≥ 13 chars, 13-digit head      │
//! │     ┌───┬──────┬────────┬────┬──────────┐                              │
//! │     │ 2 │ PLU  │ amount │ .xx│  suffix  │                              │
//! │     │ 1 │  4   │   6    │ 2  │   ≥ 1    │                              │
//! │     └───┴──────┴────────┴────┴──────────┘                              │
//! │              │ no                                                       │
//! │              ▼                                                          │
//! │  2. EAN-13 / UPC-A / EAN-8?  digits only, length 13 / 12 / 8           │
//! │     mod-10 check digit, weights 1,3 from the right                     │
//! │              │ no                                                       │
//! │              ▼                                                          │
//! │  3. GENERIC?  length ≥ 8, [A-Za-z0-9-]                                 │
//! │              │ no                                                       │
//! │              ▼                                                          │
//! │     NotRecognized                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use scanlot_core::barcode::decode;
//! use scanlot_core::{BarcodeFormat, Money};
//!
//! // 2 | 8310 | 000039 | 17 | 46
//! let item = decode("283100000391746").unwrap();
//! assert_eq!(item.format, BarcodeFormat::Code128Weighted);
//! assert_eq!(item.plu.as_deref(), Some("8310"));
//! assert_eq!(item.unit_price, Some(Money::from_cents(3917)));
//! assert_eq!(item.check_suffix.as_deref(), Some("46"));
//! ```

use chrono::{DateTime, Utc};

use crate::error::DecodeError;
use crate::money::Money;
use crate::types::{BarcodeFormat, DecodedItem};

// =============================================================================
// Field Layout
// =============================================================================

const WEIGHTED_MARKER: u8 = b'2';
const PLU_LEN: usize = 4;
const AMOUNT_LEN: usize = 6;
const FRACTION_LEN: usize = 2;
/// Marker + PLU + amount + fraction.
const WEIGHTED_HEAD_LEN: usize = 1 + PLU_LEN + AMOUNT_LEN + FRACTION_LEN;
/// At least one suffix digit must follow the head.
const WEIGHTED_MIN_LEN: usize = WEIGHTED_HEAD_LEN + 1;

/// Minimum length of a free-form code.
pub const GENERIC_MIN_LEN: usize = 8;

// =============================================================================
// Decoding
// =============================================================================

/// Decodes a raw scan.
///
/// Leading zero-padding is only stripped for the weighted attempt: retail
/// symbologies are classified on the code as scanned, so a UPC-A padded to
/// 13 digits stays an EAN-13.
pub fn decode(raw: &str) -> Result<DecodedItem, DecodeError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(DecodeError::NotRecognized {
            code: String::new(),
        });
    }

    let stripped = code.trim_start_matches('0');
    if let Some(item) = decode_weighted(code, stripped)? {
        return Ok(item);
    }

    if let Some(item) = decode_retail(code)? {
        return Ok(item);
    }

    if is_generic(code) {
        return Ok(DecodedItem {
            code: code.to_string(),
            format: BarcodeFormat::Generic,
            plu: None,
            unit_price: None,
            check_suffix: None,
            check_digit_valid: false,
        });
    }

    Err(DecodeError::NotRecognized {
        code: code.to_string(),
    })
}

/// Weighted label parse over the zero-stripped input.
///
/// Returns `Ok(None)` when the input is not shaped like a weighted label,
/// so the caller falls through to the retail symbologies. A 13-digit string
/// with no room for a suffix is left to EAN-13.
fn decode_weighted(code: &str, stripped: &str) -> Result<Option<DecodedItem>, DecodeError> {
    let bytes = stripped.as_bytes();
    if bytes.first() != Some(&WEIGHTED_MARKER) || bytes.len() < WEIGHTED_HEAD_LEN {
        return Ok(None);
    }
    if !bytes[..WEIGHTED_HEAD_LEN].iter().all(u8::is_ascii_digit) {
        return Ok(None);
    }
    if bytes.len() == WEIGHTED_HEAD_LEN {
        return Ok(None);
    }

    let digit_run = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if digit_run < WEIGHTED_MIN_LEN || digit_run != bytes.len() {
        return Err(DecodeError::InvalidLength {
            code: code.to_string(),
            required: WEIGHTED_MIN_LEN,
            actual: digit_run,
        });
    }

    let plu = &stripped[1..1 + PLU_LEN];
    let amount_end = 1 + PLU_LEN + AMOUNT_LEN;
    let major = parse_digits(&stripped[1 + PLU_LEN..amount_end]);
    let minor = parse_digits(&stripped[amount_end..WEIGHTED_HEAD_LEN]);
    let suffix = &stripped[WEIGHTED_HEAD_LEN..];

    Ok(Some(DecodedItem {
        code: code.to_string(),
        format: BarcodeFormat::Code128Weighted,
        plu: Some(plu.to_string()),
        unit_price: Some(Money::from_major_minor(major, minor)),
        check_suffix: Some(suffix.to_string()),
        check_digit_valid: check_digit_matches(bytes),
    }))
}

/// EAN-13 / UPC-A / EAN-8 parse. `Ok(None)` when not all digits or the
/// length matches none of them.
fn decode_retail(code: &str) -> Result<Option<DecodedItem>, DecodeError> {
    let bytes = code.as_bytes();
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Ok(None);
    }

    let format = match bytes.len() {
        13 => BarcodeFormat::Ean13,
        12 => BarcodeFormat::UpcA,
        8 => BarcodeFormat::Ean8,
        _ => return Ok(None),
    };

    let (body, check) = bytes.split_at(bytes.len() - 1);
    let expected = compute_check_digit(body);
    let found = check[0] - b'0';
    if expected != found {
        return Err(DecodeError::InvalidCheckDigit {
            code: code.to_string(),
            expected,
            found,
        });
    }

    Ok(Some(DecodedItem {
        code: code.to_string(),
        format,
        plu: None,
        unit_price: None,
        check_suffix: None,
        check_digit_valid: true,
    }))
}

fn is_generic(code: &str) -> bool {
    code.len() >= GENERIC_MIN_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn parse_digits(digits: &str) -> i64 {
    digits
        .bytes()
        .fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'))
}

// =============================================================================
// Checksum
// =============================================================================

/// Computes the mod-10 check digit for `body` (digits without the check
/// digit). Weights alternate 3,1 starting from the rightmost body digit,
/// which is the same as 1,3 from the rightmost digit of the full code.
pub fn compute_check_digit(body: &[u8]) -> u8 {
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 {
                digit * 3
            } else {
                digit
            }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Returns true if the last digit of `digits` is the mod-10 check digit of
/// the rest. `digits` must be ASCII digits.
pub fn check_digit_matches(digits: &[u8]) -> bool {
    match digits.split_last() {
        Some((last, body)) if !body.is_empty() => compute_check_digit(body) == last - b'0',
        _ => false,
    }
}

/// Validates a 13-digit EAN code.
///
/// ## Example
/// ```rust
/// use scanlot_core::barcode::is_valid_ean13;
///
/// assert!(is_valid_ean13("4006381333931"));
/// assert!(!is_valid_ean13("4006381333932"));
/// assert!(!is_valid_ean13("400638133393"));
/// ```
pub fn is_valid_ean13(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 13 && bytes.iter().all(u8::is_ascii_digit) && check_digit_matches(bytes)
}

// =============================================================================
// Weighted Portions
// =============================================================================

/// Weight in grams of a portion priced `portion_price` at `price_per_kilo`,
/// rounded to the nearest gram. `None` if the price per kilo is not positive.
///
/// ## Example
/// ```rust
/// use scanlot_core::barcode::portion_grams;
/// use scanlot_core::Money;
///
/// // 39.17 at 100.00/kg is 391.7 g
/// assert_eq!(portion_grams(Money::from_cents(3917), Money::from_cents(10000)), Some(392));
/// ```
pub fn portion_grams(portion_price: Money, price_per_kilo: Money) -> Option<i64> {
    let ppk = price_per_kilo.cents();
    if ppk <= 0 {
        return None;
    }
    let scaled = i128::from(portion_price.cents()) * 1000;
    let ppk = i128::from(ppk);
    Some(((scaled * 2 + ppk) / (ppk * 2)) as i64)
}

// =============================================================================
// Scan Debouncer
// =============================================================================

/// Suppresses repeated reads of the same code within a time window.
///
/// Scanners fire several reads while a label stays in view; only the first
/// read of a code in each window is accepted. A different code is always
/// accepted and restarts the window.
#[derive(Debug, Clone)]
pub struct ScanDebouncer {
    window_ms: i64,
    last: Option<(String, DateTime<Utc>)>,
}

impl ScanDebouncer {
    /// Creates a debouncer with the given window in milliseconds.
    pub fn new(window_ms: u64) -> Self {
        ScanDebouncer {
            window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
            last: None,
        }
    }

    /// Returns true if a read of `code` at `at` should be processed.
    pub fn accept(&mut self, code: &str, at: DateTime<Utc>) -> bool {
        if let Some((last_code, last_at)) = &self.last {
            let elapsed = at.signed_duration_since(*last_at).num_milliseconds();
            if last_code == code && elapsed < self.window_ms {
                return false;
            }
        }
        self.last = Some((code.to_string(), at));
        true
    }

    /// Forgets the last accepted read.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_weighted_label() {
        let item = decode("283100000391746").unwrap();
        assert_eq!(item.format, BarcodeFormat::Code128Weighted);
        assert_eq!(item.plu.as_deref(), Some("8310"));
        assert_eq!(item.unit_price, Some(Money::from_cents(3917)));
        assert_eq!(item.check_suffix.as_deref(), Some("46"));
        assert_eq!(item.code, "283100000391746");
    }

    #[test]
    fn test_fourteen_digit_label_keeps_fixed_widths() {
        // 2 | 8310 | 000391 | 74 | 6: the amount field is always six digits
        let item = decode("28310000391746").unwrap();
        assert_eq!(item.plu.as_deref(), Some("8310"));
        assert_eq!(item.unit_price, Some(Money::from_cents(39174)));
        assert_eq!(item.check_suffix.as_deref(), Some("6"));
    }

    #[test]
    fn test_weighted_recovers_every_field() {
        for plu in [0u32, 1, 8310, 9999] {
            for (major, minor) in [(0i64, 1i64), (39, 17), (999_999, 99), (120, 0)] {
                for suffix in ["0", "46", "123456"] {
                    let raw = format!("2{:04}{:06}{:02}{}", plu, major, minor, suffix);
                    let item = decode(&raw).unwrap();
                    assert_eq!(item.plu, Some(format!("{:04}", plu)), "{raw}");
                    assert_eq!(
                        item.unit_price,
                        Some(Money::from_major_minor(major, minor)),
                        "{raw}"
                    );
                    assert_eq!(item.check_suffix.as_deref(), Some(suffix));
                }
            }
        }
    }

    #[test]
    fn test_weighted_strips_zero_padding() {
        let item = decode("00283100000391746").unwrap();
        assert_eq!(item.format, BarcodeFormat::Code128Weighted);
        assert_eq!(item.plu.as_deref(), Some("8310"));
        assert_eq!(item.unit_price, Some(Money::from_cents(3917)));
        assert_eq!(item.code, "00283100000391746");
    }

    #[test]
    fn test_weighted_trailing_garbage_is_invalid_length() {
        let err = decode("2831000039174X").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidLength {
                code: "2831000039174X".into(),
                required: 14,
                actual: 13,
            }
        );
    }

    #[test]
    fn test_thirteen_digits_starting_with_two_is_ean13() {
        let body = b"200000000001";
        let check = compute_check_digit(body);
        let code = format!("{}{}", std::str::from_utf8(body).unwrap(), check);
        let item = decode(&code).unwrap();
        assert_eq!(item.format, BarcodeFormat::Ean13);
        assert!(item.check_digit_valid);
    }

    #[test]
    fn test_retail_formats() {
        assert_eq!(decode("4006381333931").unwrap().format, BarcodeFormat::Ean13);
        assert_eq!(decode("036000291452").unwrap().format, BarcodeFormat::UpcA);
        assert_eq!(decode("96385074").unwrap().format, BarcodeFormat::Ean8);
    }

    #[test]
    fn test_invalid_check_digit() {
        let err = decode("4006381333932").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidCheckDigit {
                code: "4006381333932".into(),
                expected: 1,
                found: 2,
            }
        );
    }

    #[test]
    fn test_flipping_final_digit_breaks_checksum() {
        // Walk a spread of 12-digit bodies, append the right check digit,
        // then every other final digit must be rejected.
        let mut seed: u64 = 0x5eed_1234;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let body = format!("{:012}", seed % 1_000_000_000_000);
            let check = compute_check_digit(body.as_bytes());
            let valid = format!("{}{}", body, check);
            assert!(is_valid_ean13(&valid), "{valid}");

            for other in (0..10u8).filter(|d| *d != check) {
                let flipped = format!("{}{}", body, other);
                assert!(!is_valid_ean13(&flipped), "{flipped}");
            }
        }
    }

    #[test]
    fn test_generic_codes() {
        let item = decode("ABC-12345").unwrap();
        assert_eq!(item.format, BarcodeFormat::Generic);
        assert!(!item.check_digit_valid);

        // Ten digits is no retail length, so it is free-form
        assert_eq!(decode("1234567890").unwrap().format, BarcodeFormat::Generic);
    }

    #[test]
    fn test_not_recognized() {
        assert!(matches!(decode(""), Err(DecodeError::NotRecognized { .. })));
        assert!(matches!(decode("   "), Err(DecodeError::NotRecognized { .. })));
        assert!(matches!(decode("ABC12"), Err(DecodeError::NotRecognized { .. })));
        assert!(matches!(decode("ABC 12345"), Err(DecodeError::NotRecognized { .. })));
        assert!(matches!(decode("ÁRBOL-123"), Err(DecodeError::NotRecognized { .. })));
    }

    #[test]
    fn test_batch_decode_collects_all_failures() {
        let raws = ["283100000391746", "4006381333932", "x", "4006381333931"];
        let (ok, failed): (Vec<_>, Vec<_>) = raws.iter().map(|r| decode(r)).partition(Result::is_ok);
        assert_eq!(ok.len(), 2);
        assert_eq!(failed.len(), 2);
    }

    #[test]
    fn test_portion_grams() {
        assert_eq!(
            portion_grams(Money::from_cents(3917), Money::from_cents(10000)),
            Some(392)
        );
        assert_eq!(
            portion_grams(Money::from_cents(5000), Money::from_cents(10000)),
            Some(500)
        );
        assert_eq!(portion_grams(Money::from_cents(5000), Money::zero()), None);
    }

    #[test]
    fn test_debouncer_window() {
        let t0 = Utc::now();
        let mut debouncer = ScanDebouncer::new(5000);

        assert!(debouncer.accept("A", t0));
        assert!(!debouncer.accept("A", t0 + Duration::milliseconds(4999)));
        assert!(debouncer.accept("B", t0 + Duration::milliseconds(5000)));
        assert!(debouncer.accept("A", t0 + Duration::milliseconds(5001)));
        assert!(debouncer.accept("A", t0 + Duration::milliseconds(10_001)));

        debouncer.reset();
        assert!(debouncer.accept("A", t0 + Duration::milliseconds(10_002)));
    }
}
