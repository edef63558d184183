//! Per-symbol market observations used by the position rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market metrics for one symbol at one fetch instant.
///
/// Every field is individually nullable; a failed or missing endpoint leaves
/// its fields unset and the rule engine reports them as missing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetrics {
    /// Open interest in base units.
    pub open_interest: Option<Decimal>,
    /// Price used to convert open interest into notional.
    pub reference_price: Option<Decimal>,
    /// Open interest in quote currency.
    pub open_interest_notional: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    /// Herfindahl-Hirschman concentration index (0..1).
    pub hhi: Option<Decimal>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SymbolMetrics {
    /// Derive the notional when both factors are known.
    pub fn with_derived_notional(mut self) -> Self {
        if self.open_interest_notional.is_none() {
            if let (Some(oi), Some(px)) = (self.open_interest, self.reference_price) {
                self.open_interest_notional = Some(oi * px);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_derived_notional() {
        let metrics = SymbolMetrics {
            open_interest: Some(dec!(1000)),
            reference_price: Some(dec!(50)),
            ..Default::default()
        }
        .with_derived_notional();
        assert_eq!(metrics.open_interest_notional, Some(dec!(50000)));
    }

    #[test]
    fn test_derived_notional_keeps_explicit_value() {
        let metrics = SymbolMetrics {
            open_interest: Some(dec!(1000)),
            reference_price: Some(dec!(50)),
            open_interest_notional: Some(dec!(1)),
            ..Default::default()
        }
        .with_derived_notional();
        assert_eq!(metrics.open_interest_notional, Some(dec!(1)));
    }
}
