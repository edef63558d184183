//! Wire DTOs for the futures REST endpoints.
//!
//! The exchange reports all decimals as strings; `Decimal`'s serde support
//! accepts both strings and numbers, so fields deserialize directly.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Response of the signed account endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub total_initial_margin: Decimal,
    pub total_margin_balance: Decimal,
    pub available_balance: Decimal,
    #[serde(default)]
    pub positions: Vec<AccountPosition>,
}

/// Per-position row of the account endpoint; carries the initial margin the
/// position-risk endpoint lacks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPosition {
    pub symbol: String,
    pub initial_margin: Decimal,
    pub position_side: String,
    #[serde(default)]
    pub position_amt: Decimal,
}

/// One row of the signed position-risk endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: String,
    pub position_amt: Decimal,
    pub mark_price: Decimal,
    pub leverage: Decimal,
    /// `cross` or `isolated` (lowercase on the wire).
    pub margin_type: String,
    #[serde(default)]
    pub isolated_margin: Decimal,
    pub position_side: String,
    #[serde(default)]
    pub notional: Decimal,
    #[serde(default)]
    pub update_time: i64,
}

/// One row of the premium-index endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumIndex {
    pub symbol: String,
    pub mark_price: Decimal,
    pub last_funding_rate: Decimal,
    #[serde(default)]
    pub next_funding_time: i64,
    #[serde(default)]
    pub time: i64,
}

/// Response of the open-interest endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInterest {
    pub symbol: String,
    pub open_interest: Decimal,
    #[serde(default)]
    pub time: i64,
}

/// Response of the listen-key create endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ListenKeyResponse {
    #[serde(rename = "listenKey")]
    pub listen_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_info_decodes_string_decimals() {
        let raw = r#"{
            "totalInitialMargin": "123.45",
            "totalMarginBalance": "1000.0",
            "availableBalance": "876.55",
            "positions": [
                {"symbol": "BTCUSDT", "initialMargin": "123.45", "positionSide": "LONG", "positionAmt": "0.5"}
            ]
        }"#;
        let info: AccountInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.total_margin_balance, dec!(1000.0));
        assert_eq!(info.positions[0].initial_margin, dec!(123.45));
    }

    #[test]
    fn test_position_risk_decodes() {
        let raw = r#"[{
            "symbol": "ETHUSDT",
            "positionAmt": "-2",
            "markPrice": "2000.5",
            "leverage": "5",
            "marginType": "cross",
            "isolatedMargin": "0",
            "positionSide": "SHORT",
            "notional": "-4001",
            "updateTime": 1700000000000
        }]"#;
        let rows: Vec<PositionRisk> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows[0].position_amt, dec!(-2));
        assert_eq!(rows[0].margin_type, "cross");
    }
}
