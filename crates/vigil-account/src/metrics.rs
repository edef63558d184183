//! Per-symbol market metrics with TTL caching and bounded fetch concurrency.

use chrono::Utc;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use vigil_core::{base_asset, SymbolMetrics};
use vigil_rest::{ApexClient, FuturesRestClient, TokenInfo};

/// Metrics fetcher configuration.
#[derive(Debug, Clone)]
pub struct MetricsFetcherConfig {
    /// TTL of each cached endpoint observation.
    pub ttl: Duration,
    /// Concurrent fetch workers.
    pub concurrency: usize,
}

impl Default for MetricsFetcherConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(180),
            concurrency: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

impl<T: Clone> CacheEntry<T> {
    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.fetched_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

/// Concurrent per-symbol fetcher for open interest and token info.
///
/// Each endpoint caches per key with its own timestamp; a fetch failure
/// leaves the affected fields nil for this round and is retried once the
/// TTL-stale entry is next requested.
pub struct SymbolMetricsFetcher {
    rest: Arc<FuturesRestClient>,
    apex: Arc<ApexClient>,
    config: MetricsFetcherConfig,
    oi_cache: DashMap<String, CacheEntry<Decimal>>,
    token_cache: DashMap<String, CacheEntry<TokenInfo>>,
}

impl SymbolMetricsFetcher {
    pub fn new(
        rest: Arc<FuturesRestClient>,
        apex: Arc<ApexClient>,
        config: MetricsFetcherConfig,
    ) -> Self {
        Self {
            rest,
            apex,
            config,
            oi_cache: DashMap::new(),
            token_cache: DashMap::new(),
        }
    }

    /// Fetch metrics for a symbol set. `reference_prices` supplies the mark
    /// price used to derive open-interest notional.
    pub async fn fetch(
        &self,
        symbols: &[String],
        reference_prices: &HashMap<String, Decimal>,
    ) -> HashMap<String, SymbolMetrics> {
        let results = stream::iter(symbols.iter().cloned())
            .map(|symbol| {
                let reference_price = reference_prices.get(&symbol).copied();
                async move {
                    let metrics = self.fetch_symbol(&symbol, reference_price).await;
                    (symbol, metrics)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        results.into_iter().collect()
    }

    async fn fetch_symbol(&self, symbol: &str, reference_price: Option<Decimal>) -> SymbolMetrics {
        let open_interest = self.open_interest(symbol).await;
        let token = self.token_info(&base_asset(symbol)).await;

        SymbolMetrics {
            open_interest,
            reference_price,
            open_interest_notional: None,
            market_cap: token.as_ref().and_then(|t| t.market_cap),
            volume_24h: token.as_ref().and_then(|t| t.volume_24h),
            hhi: token.as_ref().and_then(|t| t.hhi),
            fetched_at: Some(Utc::now()),
        }
        .with_derived_notional()
    }

    async fn open_interest(&self, symbol: &str) -> Option<Decimal> {
        if let Some(entry) = self.oi_cache.get(symbol) {
            if let Some(value) = entry.fresh(self.config.ttl) {
                debug!(%symbol, "Open interest cache hit");
                return Some(value);
            }
        }

        match self.rest.open_interest(symbol).await {
            Ok(response) => {
                self.oi_cache.insert(
                    symbol.to_string(),
                    CacheEntry {
                        value: response.open_interest,
                        fetched_at: Instant::now(),
                    },
                );
                Some(response.open_interest)
            }
            Err(err) => {
                warn!(%symbol, %err, "Open interest fetch failed");
                None
            }
        }
    }

    async fn token_info(&self, base: &str) -> Option<TokenInfo> {
        if let Some(entry) = self.token_cache.get(base) {
            if let Some(value) = entry.fresh(self.config.ttl) {
                debug!(%base, "Token info cache hit");
                return Some(value);
            }
        }

        match self.apex.token_info(base).await {
            Ok(info) => {
                self.token_cache.insert(
                    base.to_string(),
                    CacheEntry {
                        value: info.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Some(info)
            }
            Err(err) => {
                warn!(%base, %err, "Token info fetch failed");
                None
            }
        }
    }
}
