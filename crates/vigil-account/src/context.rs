//! Account context assembly.
//!
//! Merges the three account-side endpoints into one [`AccountContext`]:
//! totals and per-position initial margins from the account endpoint,
//! position geometry from position-risk, and predicted funding from the
//! premium index.

use crate::error::{AccountError, AccountResult};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;
use vigil_core::{
    base_asset, AccountContext, MarginType, PositionDirection, PositionSide, PositionSnapshot,
};
use vigil_rest::{AccountInfo, FuturesRestClient, PositionRisk, PremiumIndex};

/// Fetch and assemble the account context. Errors propagate so the
/// validation tick can abort.
pub async fn fetch_account_context(rest: &FuturesRestClient) -> AccountResult<AccountContext> {
    let (account, risks, premiums) = tokio::try_join!(
        async { rest.account().await.map_err(AccountError::from) },
        async { rest.position_risk().await.map_err(AccountError::from) },
        async { rest.premium_index().await.map_err(AccountError::from) },
    )?;
    Ok(build_account_context(account, risks, &premiums))
}

/// Assemble an [`AccountContext`] from raw endpoint responses.
pub fn build_account_context(
    account: AccountInfo,
    risks: Vec<PositionRisk>,
    premiums: &[PremiumIndex],
) -> AccountContext {
    let funding_by_symbol: HashMap<&str, Decimal> = premiums
        .iter()
        .map(|p| (p.symbol.as_str(), p.last_funding_rate))
        .collect();

    // Initial margin lives on the account endpoint, keyed by symbol + side.
    let margin_by_position: HashMap<(String, String), Decimal> = account
        .positions
        .iter()
        .map(|p| {
            (
                (p.symbol.clone(), p.position_side.clone()),
                p.initial_margin,
            )
        })
        .collect();

    let fetched_at = Utc::now();
    let snapshots = risks
        .into_iter()
        .filter_map(|risk| {
            let position_side = parse_position_side(&risk.position_side);
            let direction = PositionDirection::resolve(position_side, risk.position_amt);
            let snapshot = PositionSnapshot {
                base_asset: base_asset(&risk.symbol),
                initial_margin: margin_by_position
                    .get(&(risk.symbol.clone(), risk.position_side.clone()))
                    .copied()
                    .unwrap_or(Decimal::ZERO),
                predicted_funding_rate: funding_by_symbol.get(risk.symbol.as_str()).copied(),
                notional: risk.notional.abs(),
                margin_type: parse_margin_type(&risk.margin_type),
                direction,
                symbol: risk.symbol,
                position_amt: risk.position_amt,
                leverage: risk.leverage,
                isolated_margin: risk.isolated_margin,
                mark_price: risk.mark_price,
                updated_at: fetched_at,
            };
            if snapshot.is_empty() {
                debug!(symbol = %snapshot.symbol, "Dropping empty position row");
                None
            } else {
                Some(snapshot)
            }
        })
        .collect();

    AccountContext {
        total_initial_margin: account.total_initial_margin,
        total_margin_balance: account.total_margin_balance,
        available_balance: account.available_balance,
        snapshots,
        fetched_at,
    }
}

fn parse_position_side(raw: &str) -> PositionSide {
    match raw {
        "LONG" => PositionSide::Long,
        "SHORT" => PositionSide::Short,
        _ => PositionSide::Both,
    }
}

fn parse_margin_type(raw: &str) -> MarginType {
    if raw.eq_ignore_ascii_case("isolated") {
        MarginType::Isolated
    } else {
        MarginType::Cross
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account_info() -> AccountInfo {
        serde_json::from_str(
            r#"{
                "totalInitialMargin": "150",
                "totalMarginBalance": "1000",
                "availableBalance": "850",
                "positions": [
                    {"symbol": "BTCUSDT", "initialMargin": "100", "positionSide": "LONG", "positionAmt": "0.5"},
                    {"symbol": "ETHUSDT", "initialMargin": "50", "positionSide": "SHORT", "positionAmt": "-2"}
                ]
            }"#,
        )
        .unwrap()
    }

    fn risks() -> Vec<PositionRisk> {
        serde_json::from_str(
            r#"[
                {"symbol": "BTCUSDT", "positionAmt": "0.5", "markPrice": "45000",
                 "leverage": "3", "marginType": "cross", "isolatedMargin": "0",
                 "positionSide": "LONG", "notional": "22500", "updateTime": 0},
                {"symbol": "ETHUSDT", "positionAmt": "-2", "markPrice": "2000",
                 "leverage": "5", "marginType": "isolated", "isolatedMargin": "800",
                 "positionSide": "SHORT", "notional": "-4000", "updateTime": 0},
                {"symbol": "SOLUSDT", "positionAmt": "0", "markPrice": "100",
                 "leverage": "2", "marginType": "cross", "isolatedMargin": "0",
                 "positionSide": "BOTH", "notional": "0", "updateTime": 0}
            ]"#,
        )
        .unwrap()
    }

    fn premiums() -> Vec<PremiumIndex> {
        serde_json::from_str(
            r#"[
                {"symbol": "BTCUSDT", "markPrice": "45000", "lastFundingRate": "0.0001"},
                {"symbol": "ETHUSDT", "markPrice": "2000", "lastFundingRate": "-0.0005"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_context_merges_endpoints() {
        let ctx = build_account_context(account_info(), risks(), &premiums());

        assert_eq!(ctx.total_margin_balance, dec!(1000));
        // Zero row dropped.
        assert_eq!(ctx.snapshots.len(), 2);

        let btc = &ctx.snapshots[0];
        assert_eq!(btc.base_asset, "BTC");
        assert_eq!(btc.direction, PositionDirection::Long);
        assert_eq!(btc.initial_margin, dec!(100));
        assert_eq!(btc.predicted_funding_rate, Some(dec!(0.0001)));
        assert_eq!(btc.notional, dec!(22500));

        let eth = &ctx.snapshots[1];
        assert_eq!(eth.direction, PositionDirection::Short);
        assert_eq!(eth.margin_type, MarginType::Isolated);
        assert_eq!(eth.notional, dec!(4000));
        assert_eq!(eth.predicted_funding_rate, Some(dec!(-0.0005)));
    }

    #[test]
    fn test_missing_premium_leaves_funding_nil() {
        let ctx = build_account_context(account_info(), risks(), &[]);
        assert!(ctx.snapshots.iter().all(|s| s.predicted_funding_rate.is_none()));
    }
}
