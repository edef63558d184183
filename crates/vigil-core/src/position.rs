//! Account and position snapshots consumed by the validation engine.

use crate::event::PositionSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote assets recognized when deriving a base asset from a pair symbol,
/// longest first so `FDUSD` wins over `USD`.
const QUOTE_ASSETS: [&str; 5] = ["FDUSD", "USDT", "USDC", "BUSD", "USD"];

/// Strip the quote component from a trading-pair symbol (`ETHUSDT` -> `ETH`).
///
/// Unrecognized quotes leave the symbol untouched. Always uppercased.
pub fn base_asset(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    for quote in QUOTE_ASSETS {
        if let Some(base) = upper.strip_suffix(quote) {
            if !base.is_empty() {
                return base.to_string();
            }
        }
    }
    upper
}

/// The quote component of a trading-pair symbol, defaulting to `USDT`.
pub fn quote_asset(symbol: &str) -> &'static str {
    let upper = symbol.trim().to_uppercase();
    for quote in QUOTE_ASSETS {
        if upper.ends_with(quote) && upper.len() > quote.len() {
            return quote;
        }
    }
    "USDT"
}

/// Margin mode of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginType {
    Cross,
    Isolated,
}

/// Resolved position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionDirection {
    Long,
    Short,
}

impl PositionDirection {
    /// Resolve from the exchange position side, falling back to the sign of
    /// the position amount in one-way mode.
    pub fn resolve(position_side: PositionSide, position_amt: Decimal) -> Self {
        match position_side {
            PositionSide::Long => Self::Long,
            PositionSide::Short => Self::Short,
            PositionSide::Both => {
                if position_amt < Decimal::ZERO {
                    Self::Short
                } else {
                    Self::Long
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One open position, normalized for rule evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Base asset, uppercase, quote stripped.
    pub base_asset: String,
    pub symbol: String,
    /// Signed quantity in base units.
    pub position_amt: Decimal,
    /// Absolute quote-currency notional.
    pub notional: Decimal,
    pub leverage: Decimal,
    pub initial_margin: Decimal,
    pub isolated_margin: Decimal,
    pub margin_type: MarginType,
    pub direction: PositionDirection,
    pub mark_price: Decimal,
    pub predicted_funding_rate: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl PositionSnapshot {
    /// Empty rows (no amount, no notional) carry no information and are
    /// dropped before evaluation.
    pub fn is_empty(&self) -> bool {
        self.position_amt.is_zero() && self.notional.is_zero()
    }

    /// Key used by the aggregator's position lookup: `<symbol>:<direction>`.
    pub fn position_key(&self) -> String {
        format!("{}:{}", self.symbol, self.direction)
    }
}

/// Aggregate account state at one fetch instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountContext {
    pub total_initial_margin: Decimal,
    pub total_margin_balance: Decimal,
    pub available_balance: Decimal,
    pub snapshots: Vec<PositionSnapshot>,
    pub fetched_at: DateTime<Utc>,
}

impl AccountContext {
    /// Positions for one base asset and direction.
    pub fn positions_of<'a>(
        &'a self,
        base_asset: &'a str,
        direction: PositionDirection,
    ) -> impl Iterator<Item = &'a PositionSnapshot> {
        self.snapshots
            .iter()
            .filter(move |p| p.base_asset == base_asset && p.direction == direction)
    }

    /// Distinct base assets that currently carry positions.
    pub fn assets_with_positions(&self) -> Vec<String> {
        let mut assets: Vec<String> = self
            .snapshots
            .iter()
            .map(|p| p.base_asset.clone())
            .collect();
        assets.sort();
        assets.dedup();
        assets
    }

    /// Distinct symbols that currently carry positions.
    pub fn symbols_with_positions(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.snapshots.iter().map(|p| p.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(symbol: &str, direction: PositionDirection, amt: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            base_asset: base_asset(symbol),
            symbol: symbol.to_string(),
            position_amt: amt,
            notional: (amt * dec!(100)).abs(),
            leverage: dec!(5),
            initial_margin: dec!(10),
            isolated_margin: Decimal::ZERO,
            margin_type: MarginType::Cross,
            direction,
            mark_price: dec!(100),
            predicted_funding_rate: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_base_asset_strips_known_quotes() {
        assert_eq!(base_asset("BTCUSDT"), "BTC");
        assert_eq!(base_asset("ethusdc"), "ETH");
        assert_eq!(base_asset("SOLFDUSD"), "SOL");
        assert_eq!(base_asset("WEIRD"), "WEIRD");
    }

    #[test]
    fn test_quote_asset() {
        assert_eq!(quote_asset("BTCUSDT"), "USDT");
        assert_eq!(quote_asset("ETHUSDC"), "USDC");
        assert_eq!(quote_asset("UNKNOWN"), "USDT");
    }

    #[test]
    fn test_direction_resolution() {
        assert_eq!(
            PositionDirection::resolve(PositionSide::Short, dec!(3)),
            PositionDirection::Short
        );
        assert_eq!(
            PositionDirection::resolve(PositionSide::Both, dec!(-0.5)),
            PositionDirection::Short
        );
        assert_eq!(
            PositionDirection::resolve(PositionSide::Both, dec!(0.5)),
            PositionDirection::Long
        );
    }

    #[test]
    fn test_position_key() {
        let snap = snapshot("BTCUSDT", PositionDirection::Long, dec!(1));
        assert_eq!(snap.position_key(), "BTCUSDT:long");
    }

    #[test]
    fn test_assets_with_positions_dedups() {
        let ctx = AccountContext {
            total_initial_margin: dec!(20),
            total_margin_balance: dec!(1000),
            available_balance: dec!(980),
            snapshots: vec![
                snapshot("BTCUSDT", PositionDirection::Long, dec!(1)),
                snapshot("BTCUSDT", PositionDirection::Short, dec!(-1)),
                snapshot("ETHUSDT", PositionDirection::Long, dec!(2)),
            ],
            fetched_at: Utc::now(),
        };
        assert_eq!(ctx.assets_with_positions(), vec!["BTC", "ETH"]);
        assert_eq!(ctx.symbols_with_positions(), vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(ctx.positions_of("BTC", PositionDirection::Long).count(), 1);
    }
}
