//! Main application orchestration.
//!
//! Wires the components together:
//! - user-data stream → aggregator → dispatcher → webhooks
//! - validation service → alert webhook
//!
//! Startup fails fast (config, rules file, initial listen key); after that
//! every component retries internally and the process only exits on signal.

use crate::config::AppConfig;
use crate::error::AppResult;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vigil_account::{
    AccountSummaryProvider, MetricsFetcherConfig, SymbolMetricsFetcher,
};
use vigil_notify::{spawn_notification_dispatcher, WebhookSink};
use vigil_orders::{spawn_order_aggregator, AggregatorConfig, OrderNotification};
use vigil_rest::{ApexClient, FuturesRestClient};
use vigil_rules::{
    load_rules, PositionRuleEngine, ValidationService, ValidationServiceConfig,
};
use vigil_stream::{StreamConfig, UserDataStream};

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run until SIGINT/SIGTERM. Returns an error only on startup failure.
    pub async fn run(self) -> AppResult<()> {
        vigil_stream::init_crypto();
        let config = &self.config;
        let shutdown = CancellationToken::new();

        // Rules file must be valid before anything connects.
        let rules = load_rules(Path::new(&config.position_rules_config_path))?;
        info!(
            path = %config.position_rules_config_path,
            overrides = rules.configured_assets().len(),
            "Position rules loaded"
        );

        let rest = Arc::new(FuturesRestClient::new(
            &config.rest_url,
            &config.api_key,
            &config.api_secret,
        )?);
        let apex = Arc::new(ApexClient::new(&config.apex_url)?);

        let provider = Arc::new(AccountSummaryProvider::new(rest.clone()));
        let metrics = Arc::new(SymbolMetricsFetcher::new(
            rest.clone(),
            apex,
            MetricsFetcherConfig::default(),
        ));

        // Notification pipeline: aggregator → dispatcher → webhooks.
        let (notifications_tx, notifications_rx) = mpsc::channel::<OrderNotification>(1024);
        let lifecycle_sink = Arc::new(WebhookSink::new(
            &config.lifecycle_webhook_url,
            config.max_retry,
        )?);
        let fill_sink = Arc::new(WebhookSink::new(&config.fill_webhook_url, config.max_retry)?);
        let alert_sink = Arc::new(WebhookSink::new(&config.alert_webhook_url, config.max_retry)?);

        let aggregator_config = AggregatorConfig {
            window: config.aggregation_window,
            ..AggregatorConfig::default()
        };
        let dedup_ttl = aggregator_config.dedup_ttl;
        let (aggregator, aggregator_task) =
            spawn_order_aggregator(aggregator_config, provider.clone(), notifications_tx);
        let dispatcher_task = spawn_notification_dispatcher(
            notifications_rx,
            lifecycle_sink,
            fill_sink,
            dedup_ttl,
        );

        // Validation loop.
        let validation = ValidationService::new(
            ValidationServiceConfig {
                interval: config.position_validation_interval,
                cooldown_floor: None,
            },
            provider.clone(),
            metrics,
            PositionRuleEngine::new(rules),
            alert_sink,
            shutdown.clone(),
        );
        let validation_task = tokio::spawn(validation.run());

        // User-data stream. The initial listen key gates startup.
        let (events_tx, mut events_rx) = mpsc::channel(1024);
        let stream = UserDataStream::new(
            rest,
            StreamConfig {
                ws_base_url: config.ws_url.clone(),
                keep_alive_interval: config.listen_key_keep_alive,
                ..StreamConfig::default()
            },
            events_tx,
            shutdown.clone(),
        );
        let listen_key = stream.acquire_listen_key().await?;

        let stream_task = tokio::spawn(async move {
            if let Err(err) = stream.run(listen_key).await {
                error!(%err, "User-data stream terminated with error");
            }
        });

        // Feed normalized events into the aggregator in arrival order.
        let feeder = aggregator.clone();
        let feeder_task = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if feeder.submit(event).await.is_err() {
                    warn!("Aggregator gone, stopping event feed");
                    break;
                }
            }
        });

        info!("Monitor running");
        wait_for_signal().await;
        info!("Shutdown signal received");

        // Stop intake first, then drain the pipeline.
        shutdown.cancel();
        if let Err(err) = stream_task.await {
            warn!(%err, "Stream task join failed");
        }
        feeder_task.abort();
        aggregator.shutdown().await;
        let _ = aggregator_task.await;
        let _ = validation_task.await;
        dispatcher_task.abort();

        info!("Shutdown complete");
        Ok(())
    }
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(%err, "SIGTERM handler unavailable, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
