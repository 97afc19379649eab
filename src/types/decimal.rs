//! Fixed-point decimal utilities.
//!
//! ## Overview
//!
//! Series values are fixed-point decimals: an integer mantissa plus a
//! number of decimal places (the exponent). `43.0700` is mantissa
//! `430700`, exponent `4`. The codec only ever sees the mantissa; the
//! exponent lives in the block header, so every value in a block shares it.
//!
//! `rust_decimal::Decimal` is the public value type. It keeps the scale it
//! was built with, so `42.0` and `42.00` are equal but encode with
//! different exponents.
//!
//! ## Examples
//!
//! ```
//! use ticktape::types::decimal::{parse, to_fixed, from_fixed};
//!
//! let value = parse("43.0700").unwrap();
//! assert_eq!(to_fixed(value), Some((430_700, 4)));
//! assert_eq!(from_fixed(430_700, 4), Some(value));
//! ```

use std::str::FromStr;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::types::BlockHdr;

/// Largest exponent a block header can carry that `Decimal` also supports
pub const MAX_EXPONENT: u8 = if BlockHdr::EXPONENT_MAX < 28 {
    BlockHdr::EXPONENT_MAX
} else {
    28
};

// ============================================================================
// Conversion Functions
// ============================================================================

/// Parse a decimal string, keeping its written scale.
///
/// ```
/// use ticktape::types::decimal::parse;
///
/// assert_eq!(parse("42.10").unwrap().scale(), 2);
/// assert!(parse("abc").is_none());
/// ```
pub fn parse(s: &str) -> Option<Decimal> {
    Decimal::from_str(s).ok()
}

/// Split a decimal into `(mantissa, exponent)`.
///
/// Returns `None` if the mantissa does not fit in `i64`.
pub fn to_fixed(d: Decimal) -> Option<(i64, u8)> {
    let mantissa = i64::try_from(d.mantissa()).ok()?;
    let exponent = u8::try_from(d.scale()).ok()?;
    if exponent > MAX_EXPONENT {
        return None;
    }
    Some((mantissa, exponent))
}

/// Rebuild a decimal from `(mantissa, exponent)`.
///
/// Returns `None` if the exponent is out of range.
pub fn from_fixed(mantissa: i64, exponent: u8) -> Option<Decimal> {
    if exponent > MAX_EXPONENT {
        return None;
    }
    Some(Decimal::new(mantissa, exponent as u32))
}

/// Convert a decimal to `f64` for running aggregates.
#[inline]
pub fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(f64::NAN)
}

/// Linear interpolation `lo + (hi - lo) * weight`, `weight` in `[0, 1]`.
///
/// Falls back to `lo` if the weight cannot be represented.
pub fn lerp(lo: Decimal, hi: Decimal, weight: f64) -> Decimal {
    if weight <= 0.0 || lo == hi {
        return lo;
    }
    if weight >= 1.0 {
        return hi;
    }
    let Some(w) = Decimal::from_f64(weight) else {
        return lo;
    };
    (hi - lo)
        .checked_mul(w)
        .and_then(|d| lo.checked_add(d))
        .unwrap_or(lo)
}

// ============================================================================
// Unit Tests
// ============================================================================
