//! Cached account summary shared with the order aggregator.

use crate::context::fetch_account_context;
use crate::error::AccountResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use vigil_core::{AccountContext, PositionDirection, PositionSnapshot};
use vigil_rest::FuturesRestClient;

/// Default cache TTL.
const DEFAULT_TTL: Duration = Duration::from_secs(2);

/// Condensed account state for notification enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    /// Total margin balance in quote currency.
    pub total_funds: Decimal,
    pub fetched_at: DateTime<Utc>,
    /// Open positions keyed by `<symbol>:<direction>`.
    pub positions: HashMap<String, PositionSnapshot>,
    /// Sum of absolute long notionals across all positions.
    pub long_notional: Decimal,
    /// Sum of absolute short notionals across all positions.
    pub short_notional: Decimal,
}

impl AccountSummary {
    pub fn from_context(ctx: &AccountContext) -> Self {
        let mut long_notional = Decimal::ZERO;
        let mut short_notional = Decimal::ZERO;
        let mut positions = HashMap::with_capacity(ctx.snapshots.len());
        for snapshot in &ctx.snapshots {
            match snapshot.direction {
                PositionDirection::Long => long_notional += snapshot.notional.abs(),
                PositionDirection::Short => short_notional += snapshot.notional.abs(),
            }
            positions.insert(snapshot.position_key(), snapshot.clone());
        }
        Self {
            total_funds: ctx.total_margin_balance,
            fetched_at: ctx.fetched_at,
            positions,
            long_notional,
            short_notional,
        }
    }
}

/// Read seam for components that only need the summary; lets the aggregator
/// unit-test against an in-memory stub.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Current summary, or `None` when nothing has ever been fetched.
    /// Never fails: stale data is preferred over an error.
    async fn summary(&self) -> Option<Arc<AccountSummary>>;
}

struct CacheState {
    cached: Option<Arc<AccountSummary>>,
    refreshed_at: Option<Instant>,
}

/// Single-flight cached account summary provider.
///
/// The refresh critical section is guarded by a `Mutex`: a second caller
/// arriving mid-refresh awaits the same lock and then reads the result the
/// first caller just wrote, so no request is duplicated.
pub struct AccountSummaryProvider {
    rest: Arc<FuturesRestClient>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl AccountSummaryProvider {
    pub fn new(rest: Arc<FuturesRestClient>) -> Self {
        Self::with_ttl(rest, DEFAULT_TTL)
    }

    pub fn with_ttl(rest: Arc<FuturesRestClient>, ttl: Duration) -> Self {
        Self {
            rest,
            ttl,
            state: Mutex::new(CacheState {
                cached: None,
                refreshed_at: None,
            }),
        }
    }

    /// Uncached fetch for the validation tick; errors propagate.
    pub async fn fetch_context(&self) -> AccountResult<AccountContext> {
        fetch_account_context(&self.rest).await
    }
}

#[async_trait]
impl AccountSource for AccountSummaryProvider {
    async fn summary(&self) -> Option<Arc<AccountSummary>> {
        let mut state = self.state.lock().await;

        let fresh = state
            .refreshed_at
            .is_some_and(|at| at.elapsed() < self.ttl);
        if fresh {
            return state.cached.clone();
        }

        match fetch_account_context(&self.rest).await {
            Ok(ctx) => {
                let summary = Arc::new(AccountSummary::from_context(&ctx));
                state.cached = Some(summary.clone());
                state.refreshed_at = Some(Instant::now());
                debug!(
                    positions = summary.positions.len(),
                    "Account summary refreshed"
                );
                Some(summary)
            }
            Err(err) => {
                warn!(%err, "Account summary refresh failed, serving stale");
                state.cached.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vigil_core::MarginType;

    fn snapshot(symbol: &str, direction: PositionDirection, notional: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            base_asset: vigil_core::base_asset(symbol),
            symbol: symbol.to_string(),
            position_amt: dec!(1),
            notional,
            leverage: dec!(3),
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
    fn test_summary_totals_by_direction() {
        let ctx = AccountContext {
            total_initial_margin: dec!(30),
            total_margin_balance: dec!(100000),
            available_balance: dec!(99970),
            snapshots: vec![
                snapshot("BTCUSDT", PositionDirection::Long, dec!(20000)),
                snapshot("ETHUSDT", PositionDirection::Long, dec!(5000)),
                snapshot("SOLUSDT", PositionDirection::Short, dec!(10000)),
            ],
            fetched_at: Utc::now(),
        };
        let summary = AccountSummary::from_context(&ctx);
        assert_eq!(summary.total_funds, dec!(100000));
        assert_eq!(summary.long_notional, dec!(25000));
        assert_eq!(summary.short_notional, dec!(10000));
        assert!(summary.positions.contains_key("BTCUSDT:long"));
        assert!(summary.positions.contains_key("SOLUSDT:short"));
    }
}
