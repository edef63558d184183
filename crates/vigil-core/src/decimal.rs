//! Decimal parsing and display helpers.
//!
//! The exchange reports numbers as strings; arithmetic stays in `Decimal`
//! and only these helpers produce display text.

use crate::error::{CoreError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Format with exactly `dp` decimal places, rounding half away from zero.
pub fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

/// Notional display: two decimals, four when the magnitude is below one.
pub fn amount(value: Decimal) -> String {
    if value.abs() < Decimal::ONE {
        fixed(value, 4)
    } else {
        fixed(value, 2)
    }
}

/// Ratio (0..1) displayed as a percentage with two decimals.
pub fn percent(ratio: Decimal) -> String {
    format!("{}%", fixed(ratio * Decimal::from(100), 2))
}

/// Signed amount: explicit `+` for gains, bare for zero.
pub fn signed_amount(value: Decimal) -> String {
    if value > Decimal::ZERO {
        format!("+{}", amount(value))
    } else {
        amount(value)
    }
}

/// Parse a numeric observation that may arrive as a plain number or a
/// string with thousands separators (`"1,234,567.8"`).
pub fn parse_lenient(raw: &serde_json::Value) -> Result<Decimal> {
    match raw {
        serde_json::Value::Number(n) => {
            Decimal::from_str(&n.to_string()).map_err(CoreError::DecimalParse)
        }
        serde_json::Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',' && *c != ' ').collect();
            if cleaned.is_empty() {
                return Err(CoreError::InvalidNumber(s.clone()));
            }
            Decimal::from_str(&cleaned).map_err(CoreError::DecimalParse)
        }
        other => Err(CoreError::InvalidNumber(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_fixed_pads_trailing_zeros() {
        assert_eq!(fixed(dec!(45000), 8), "45000.00000000");
        assert_eq!(fixed(dec!(0.1), 2), "0.10");
    }

    #[test]
    fn test_fixed_rounds_half_away_from_zero() {
        assert_eq!(fixed(dec!(1.005), 2), "1.01");
        assert_eq!(fixed(dec!(-1.005), 2), "-1.01");
    }

    #[test]
    fn test_amount_small_magnitude_uses_four_places() {
        assert_eq!(amount(dec!(45000)), "45000.00");
        assert_eq!(amount(dec!(0.1234567)), "0.1235");
        assert_eq!(amount(dec!(-0.5)), "-0.5000");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(dec!(0.45)), "45.00%");
        assert_eq!(percent(dec!(0.012345)), "1.23%");
    }

    #[test]
    fn test_signed_amount() {
        assert_eq!(signed_amount(dec!(12.5)), "+12.50");
        assert_eq!(signed_amount(dec!(-3.2)), "-3.20");
        assert_eq!(signed_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_parse_lenient_accepts_numbers_and_strings() {
        assert_eq!(parse_lenient(&json!(1234.5)).unwrap(), dec!(1234.5));
        assert_eq!(parse_lenient(&json!("1,234,567.8")).unwrap(), dec!(1234567.8));
        assert!(parse_lenient(&json!(null)).is_err());
        assert!(parse_lenient(&json!("")).is_err());
    }
}
