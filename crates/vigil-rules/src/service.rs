//! Periodic position validation service.
//!
//! Each tick: fetch the account context, fetch market metrics for the held
//! symbols, evaluate the rule battery, run the issues through the alert
//! limiter, and post one digest card when anything fired.

use crate::engine::PositionRuleEngine;
use crate::limiter::AlertLimiter;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vigil_account::{AccountSummaryProvider, SymbolMetricsFetcher};
use vigil_notify::{digest_card, WebhookSink};

/// Validation service configuration.
#[derive(Debug, Clone)]
pub struct ValidationServiceConfig {
    pub interval: Duration,
    /// Optional floor under each issue's own cooldown.
    pub cooldown_floor: Option<Duration>,
}

impl Default for ValidationServiceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            cooldown_floor: None,
        }
    }
}

/// The validation loop.
pub struct ValidationService {
    config: ValidationServiceConfig,
    provider: Arc<AccountSummaryProvider>,
    metrics: Arc<SymbolMetricsFetcher>,
    engine: PositionRuleEngine,
    limiter: AlertLimiter,
    alert_sink: Arc<WebhookSink>,
    shutdown: CancellationToken,
}

impl ValidationService {
    pub fn new(
        config: ValidationServiceConfig,
        provider: Arc<AccountSummaryProvider>,
        metrics: Arc<SymbolMetricsFetcher>,
        engine: PositionRuleEngine,
        alert_sink: Arc<WebhookSink>,
        shutdown: CancellationToken,
    ) -> Self {
        let limiter = AlertLimiter::new(config.cooldown_floor);
        Self {
            config,
            provider,
            metrics,
            engine,
            limiter,
            alert_sink,
            shutdown,
        }
    }

    /// Run until shutdown. Ticks are strictly serial; a tick that outlasts
    /// the interval causes the overlapped firings to be skipped rather than
    /// queued.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.config.interval.as_millis(), "Validation service started");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Validation service stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        let ctx = match self.provider.fetch_context().await {
            Ok(ctx) => ctx,
            Err(err) => {
                error!(%err, "Account fetch failed, aborting validation tick");
                return;
            }
        };

        let symbols = ctx.symbols_with_positions();
        let reference_prices: HashMap<String, Decimal> = ctx
            .snapshots
            .iter()
            .map(|p| (p.symbol.clone(), p.mark_price))
            .collect();
        let metrics = self.metrics.fetch(&symbols, &reference_prices).await;

        let issues = self.engine.evaluate(&ctx, Some(&metrics));
        let events = self.limiter.process(&issues, Utc::now());
        if events.is_empty() {
            debug!(issues = issues.len(), "Validation tick clean");
            return;
        }

        info!(
            alerts = events.iter().filter(|e| !e.is_recovery()).count(),
            recoveries = events.iter().filter(|e| e.is_recovery()).count(),
            "Posting validation digest"
        );
        let card = digest_card(&events);
        self.alert_sink.post(&card.to_payload()).await;
    }
}
