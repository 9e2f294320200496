//! Monetary amount helpers using decimal arithmetic.
//!
//! Amounts are stored as [`Decimal`] and are always finite and non-negative.
//! Statistics (smoothing, medians, growth rates) run on `f64`, converted at
//! the analytics boundary with [`amount_to_f64`].

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Errors that can occur when parsing a monetary amount.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// The input is not a decimal number.
    #[error("invalid amount: {0:?}")]
    Invalid(String),
}

/// Parse an upstream amount string (e.g. `"19.99"`).
///
/// Negative values are clamped to zero; the upstream fields read through
/// this helper (totals, subtotals, tax, unit prices) are never meaningfully
/// negative.
///
/// # Errors
///
/// Returns [`AmountError::Invalid`] if the string is not a decimal number.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use storepulse_core::parse_amount;
///
/// assert_eq!(parse_amount("19.99").unwrap(), Decimal::new(1999, 2));
/// assert_eq!(parse_amount("-3").unwrap(), Decimal::ZERO);
/// assert!(parse_amount("NaN").is_err());
/// ```
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let trimmed = raw.trim();
    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| AmountError::Invalid(raw.to_owned()))?;

    Ok(value.max(Decimal::ZERO))
}

/// Convert an amount to `f64` for statistical work.
///
/// Decimal values always fit; the fallback of `0.0` only guards the API.
#[must_use]
pub fn amount_to_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_amounts() {
        assert_eq!(parse_amount("0").unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount("12.50").unwrap(), Decimal::new(1250, 2));
        assert_eq!(parse_amount(" 7 ").unwrap(), Decimal::from(7));
    }

    #[test]
    fn test_parse_clamps_negative_to_zero() {
        assert_eq!(parse_amount("-10.00").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for raw in ["", "abc", "NaN", "inf", "1.2.3"] {
            assert!(parse_amount(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_amount_to_f64() {
        let value = amount_to_f64(Decimal::new(1999, 2));
        assert!((value - 19.99).abs() < 1e-9);
    }
}
