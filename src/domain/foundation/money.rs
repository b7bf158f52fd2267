//! Integer money arithmetic.
//!
//! All settlement math happens in minor currency units with explicit
//! rounding. Division rounds half up (arithmetic rounding, not banker's
//! rounding) because the results feed two parties' settlement amounts and
//! must match provider-side bookkeeping to the cent.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Rounds `numerator / denominator` half up, in pure integer arithmetic.
///
/// Inputs must be non-negative; callers apply sign separately (refunds and
/// disputes negate after computing magnitudes).
pub fn round_half_up(numerator: i64, denominator: i64) -> i64 {
    debug_assert!(numerator >= 0 && denominator > 0);
    (numerator + denominator / 2) / denominator
}

/// Applies a basis-point rate to an amount, rounding half up.
///
/// A basis point is 1/100th of a percent: 800 bps = 8%.
pub fn apply_bps(amount_cents: i64, rate_bps: i64) -> i64 {
    round_half_up(amount_cents * rate_bps, 10_000)
}

/// Ceiling division for non-negative integers.
///
/// Used by the payer-pays gross-up, which must never under-collect.
pub fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    debug_assert!(numerator >= 0 && denominator > 0);
    (numerator + denominator - 1) / denominator
}

/// ISO 4217 currency code, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses and normalizes a currency code.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFormat` unless the input is exactly
    /// three ASCII letters.
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("expected 3-letter ISO 4217 code, got {:?}", code),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
