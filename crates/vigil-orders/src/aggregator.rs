//! Order aggregation actor.
//!
//! Consumes normalized order events strictly serially. Window deadlines are
//! spawned as cancellable timers that re-enter the same channel as flush
//! messages, so the actor remains the sole mutator of context state.

use crate::error::{OrdersError, OrdersResult};
use crate::notification::OrderNotification;
use crate::scenario::{PriceSource, Scenario};
use crate::tracker::{AggregationContext, OrderTracker, PendingFlush};
use crate::ttl::TtlSet;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use vigil_account::AccountSource;
use vigil_core::{
    classify, decimal, quote_asset, OrderCategory, OrderEvent, OrderStatus, OrderType,
};

/// Entries cached in the presentation map before it is cleared wholesale.
const PRESENTATION_CAP: usize = 4096;

/// Aggregator configuration. TTLs are parameterized so tests can shrink the
/// horizons.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Partial-fill coalescing window.
    pub window: Duration,
    /// Wire-level dedup horizon.
    pub dedup_ttl: Duration,
    /// Horizon during which terminal events for a finalized context drop.
    pub finalized_ttl: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10),
            dedup_ttl: Duration::from_secs(60),
            finalized_ttl: Duration::from_secs(60),
        }
    }
}

/// Messages consumed by the aggregator actor.
#[derive(Debug)]
pub enum AggregatorMsg {
    /// A normalized stream event.
    Event(OrderEvent),
    /// A window deadline fired for a context. Stale generations are ignored.
    Flush { context_key: String, seq: u64 },
    /// Graceful shutdown.
    Shutdown,
}

/// Handle for feeding the aggregator.
#[derive(Clone)]
pub struct OrderAggregatorHandle {
    tx: mpsc::Sender<AggregatorMsg>,
}

impl OrderAggregatorHandle {
    pub async fn submit(&self, event: OrderEvent) -> OrdersResult<()> {
        self.tx
            .send(AggregatorMsg::Event(event))
            .await
            .map_err(|_| OrdersError::ChannelClosed)
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(AggregatorMsg::Shutdown).await;
    }
}

/// The aggregator actor task.
pub struct OrderAggregatorTask {
    rx: mpsc::Receiver<AggregatorMsg>,
    /// Sender cloned into timer tasks so flushes re-enter the serial loop.
    self_tx: mpsc::Sender<AggregatorMsg>,
    config: AggregatorConfig,
    account: Arc<dyn AccountSource>,
    notifications_tx: mpsc::Sender<OrderNotification>,
    tracker: OrderTracker,
    dedup: TtlSet,
    finalized: TtlSet,
    /// Parent client order ids whose fills a child already announced.
    suppressed_parents: TtlSet,
    /// Presentation cache by client order id, for child inheritance.
    presentations: std::collections::HashMap<String, OrderCategory>,
    flush_seq: u64,
}

/// Spawn the aggregator actor.
pub fn spawn_order_aggregator(
    config: AggregatorConfig,
    account: Arc<dyn AccountSource>,
    notifications_tx: mpsc::Sender<OrderNotification>,
) -> (OrderAggregatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1024);
    let task = OrderAggregatorTask {
        rx,
        self_tx: tx.clone(),
        dedup: TtlSet::new(config.dedup_ttl),
        finalized: TtlSet::new(config.finalized_ttl),
        suppressed_parents: TtlSet::new(config.finalized_ttl),
        config,
        account,
        notifications_tx,
        tracker: OrderTracker::new(),
        presentations: std::collections::HashMap::new(),
        flush_seq: 0,
    };
    let handle = OrderAggregatorHandle { tx };
    let join = tokio::spawn(task.run());
    (handle, join)
}

impl OrderAggregatorTask {
    /// Run until shutdown. Events and flushes interleave on one channel and
    /// never overlap.
    pub async fn run(mut self) {
        debug!("OrderAggregatorTask started");
        while let Some(msg) = self.rx.recv().await {
            match msg {
                AggregatorMsg::Event(event) => self.handle_event(event).await,
                AggregatorMsg::Flush { context_key, seq } => {
                    self.handle_flush(&context_key, seq).await;
                }
                AggregatorMsg::Shutdown => break,
            }
        }
        debug!("OrderAggregatorTask terminated");
    }

    async fn handle_event(&mut self, event: OrderEvent) {
        let dedup_key = event.dedup_key();
        if self.dedup.contains(&dedup_key) {
            debug!(key = %dedup_key, "Duplicate event dropped");
            return;
        }
        self.dedup.insert(dedup_key);

        let category = self.resolve_presentation(&event);

        // Plain orders only become interesting once they fill or cancel.
        if !category.is_stop_like() && event.status == OrderStatus::New {
            trace!(client_order_id = %event.client_order_id, "Plain NEW dropped");
            return;
        }

        // A child execution suppresses its parent's own fill announcement.
        if let Some(parent) = event.original_client_order_id.as_deref() {
            if parent != event.client_order_id {
                self.suppressed_parents.insert(parent.to_string());
            }
        }
        if event.status == OrderStatus::Filled
            && !event.is_child_execution()
            && self.suppressed_parents.contains(&event.client_order_id)
        {
            let key = event.context_key();
            debug!(%key, "Parent fill suppressed, child already announced");
            self.finalized.insert(key.clone());
            self.tracker.delete(&key);
            return;
        }

        let key = event.context_key();
        if event.status.is_terminal() && self.finalized.contains(&key) {
            debug!(%key, "Event for finalized context dropped");
            return;
        }

        let ctx = self.tracker.update(&event, &category);
        ctx.cancel_pending();
        let had_partial = ctx.had_partial_fill;

        if category.is_stop_like() {
            self.route_stop_like(&key, event, had_partial).await;
        } else {
            self.route_general(&key, event, had_partial).await;
        }
    }

    async fn route_stop_like(&mut self, key: &str, event: OrderEvent, had_partial: bool) {
        match event.status {
            OrderStatus::New => {
                // The placed trigger order announces creation; the child
                // execution order (plain MARKET/LIMIT) stays quiet.
                if !event.order_type.is_market_or_limit() {
                    self.emit(key, Scenario::SltpNew, &event, false).await;
                }
            }
            OrderStatus::PartiallyFilled => {
                self.schedule_flush(key, Scenario::SltpPartialTimeout);
            }
            OrderStatus::Filled => {
                let scenario = if had_partial {
                    Scenario::SltpPartialCompleted
                } else {
                    Scenario::SltpFilled
                };
                self.emit(key, scenario, &event, true).await;
            }
            OrderStatus::Canceled => {
                let scenario = if had_partial {
                    Scenario::SltpPartialCanceled
                } else {
                    Scenario::SltpCanceled
                };
                self.emit(key, scenario, &event, true).await;
            }
            OrderStatus::Expired => {
                self.emit_passthrough(key, &event).await;
            }
            OrderStatus::Rejected => {
                self.finalize(key);
            }
            OrderStatus::PendingCancel => {}
        }
    }

    async fn route_general(&mut self, key: &str, event: OrderEvent, had_partial: bool) {
        match event.status {
            OrderStatus::PartiallyFilled => {
                self.schedule_flush(key, Scenario::GeneralTimeout);
            }
            OrderStatus::Filled => {
                let scenario = if had_partial {
                    Scenario::GeneralAggregated
                } else {
                    Scenario::GeneralSingle
                };
                self.emit(key, scenario, &event, true).await;
            }
            OrderStatus::Canceled => {
                if had_partial {
                    self.emit(key, Scenario::GeneralPartialCanceled, &event, true)
                        .await;
                } else {
                    // Nothing filled, nothing to tell.
                    self.finalize(key);
                }
            }
            OrderStatus::Expired => {
                self.emit_passthrough(key, &event).await;
            }
            OrderStatus::Rejected => {
                self.finalize(key);
            }
            // Plain NEW was dropped before reaching the tracker.
            OrderStatus::New | OrderStatus::PendingCancel => {}
        }
    }

    /// Build and send a scenario emission. Terminal emissions finalize the
    /// context before the payload leaves the actor.
    async fn emit(&mut self, key: &str, scenario: Scenario, event: &OrderEvent, terminal: bool) {
        let notification = self.build_notification(key, scenario, event).await;
        if terminal {
            self.finalize(key);
        }
        if let Some(notification) = notification {
            if self.notifications_tx.send(notification).await.is_err() {
                warn!("Notification receiver dropped");
            }
        }
    }

    /// Forward a life-cycle event the aggregator does not announce itself
    /// (expiry). The dispatcher derives the expiry reason.
    async fn emit_passthrough(&mut self, key: &str, event: &OrderEvent) {
        let notification = self.tracker.get(key).map(|ctx| OrderNotification {
            event: event.clone(),
            scenario: None,
            title: format!("{}-{}", ctx.symbol, ctx.category.title_suffix()),
            source: ctx.category.source().to_string(),
            state_label: "过期".to_string(),
            display_price: display_price(PriceSource::Average, event, ctx),
            cumulative_qty: ctx.cumulative_qty,
            cumulative_quote: ctx.cumulative_quote,
            cumulative_quote_display: None,
            cumulative_quote_ratio_display: None,
            trade_pnl_display: None,
            long_short_ratio_display: None,
            long_short_ratio_raw: None,
        });
        self.finalize(key);
        if let Some(notification) = notification {
            if self.notifications_tx.send(notification).await.is_err() {
                warn!("Notification receiver dropped");
            }
        }
    }

    fn finalize(&mut self, key: &str) {
        self.finalized.insert(key.to_string());
        self.tracker.delete(key);
    }

    /// Window deadline fired. The context may have been destroyed or
    /// re-armed since; both make the flush a no-op.
    async fn handle_flush(&mut self, key: &str, seq: u64) {
        let (scenario, event) = match self.tracker.get(key) {
            Some(ctx) => match &ctx.pending {
                Some(pending) if pending.seq == seq => match ctx.events.last() {
                    Some(event) => (pending.scenario, event.clone()),
                    None => return,
                },
                _ => {
                    trace!(%key, seq, "Stale flush ignored");
                    return;
                }
            },
            None => {
                trace!(%key, seq, "Flush for destroyed context ignored");
                return;
            }
        };

        debug!(%key, %scenario, "Window elapsed, emitting timed aggregate");
        let notification = self.build_notification(key, scenario, &event).await;
        // Timed emission destroys the context but does not finalize it: a
        // fresh partial fill may legitimately re-create it.
        self.tracker.delete(key);
        if let Some(notification) = notification {
            if self.notifications_tx.send(notification).await.is_err() {
                warn!("Notification receiver dropped");
            }
        }
    }

    fn schedule_flush(&mut self, key: &str, scenario: Scenario) {
        self.flush_seq += 1;
        let seq = self.flush_seq;
        let window = self.config.window;
        let Some(ctx) = self.tracker.get_mut(key) else {
            return;
        };
        ctx.cancel_pending();
        let cancel = CancellationToken::new();
        ctx.pending = Some(PendingFlush {
            scenario,
            seq,
            cancel: cancel.clone(),
        });

        let tx = self.self_tx.clone();
        let context_key = key.to_string();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(window) => {
                    let _ = tx.send(AggregatorMsg::Flush { context_key, seq }).await;
                }
            }
        });
    }

    /// Classification with child-inheritance: a child execution without a
    /// recognizable prefix borrows its parent's cached presentation.
    fn resolve_presentation(&mut self, event: &OrderEvent) -> OrderCategory {
        let mut category = classify(&event.client_order_id);
        if !category.is_stop_like() {
            if let Some(parent) = event.original_client_order_id.as_deref() {
                if parent != event.client_order_id {
                    if let Some(parent_category) = self.presentations.get(parent) {
                        category = parent_category.clone();
                    }
                }
            }
        }
        if category.is_stop_like() && !self.presentations.contains_key(&event.client_order_id) {
            if self.presentations.len() >= PRESENTATION_CAP {
                self.presentations.clear();
            }
            self.presentations
                .insert(event.client_order_id.clone(), category.clone());
        }
        category
    }

    async fn build_notification(
        &self,
        key: &str,
        scenario: Scenario,
        event: &OrderEvent,
    ) -> Option<OrderNotification> {
        let ctx = self.tracker.get(key)?;
        let mut notification = OrderNotification {
            event: event.clone(),
            scenario: Some(scenario),
            title: format!("{}-{}", ctx.symbol, ctx.category.title_suffix()),
            source: ctx.category.source().to_string(),
            state_label: scenario.state_label().to_string(),
            display_price: display_price(scenario.price_source(), event, ctx),
            cumulative_qty: ctx.cumulative_qty,
            cumulative_quote: ctx.cumulative_quote,
            cumulative_quote_display: None,
            cumulative_quote_ratio_display: None,
            trade_pnl_display: None,
            long_short_ratio_display: None,
            long_short_ratio_raw: None,
        };

        let with_aggregates = scenario.include_cumulative()
            && ctx.cumulative_qty > Decimal::ZERO
            && ctx.cumulative_quote > Decimal::ZERO;
        if !with_aggregates {
            return Some(notification);
        }

        let quote = quote_asset(&ctx.symbol);
        notification.cumulative_quote_display =
            Some(format!("{} {}", decimal::amount(ctx.cumulative_quote), quote));
        notification.trade_pnl_display = Some(format!(
            "{} {}",
            decimal::signed_amount(ctx.realized_pnl()),
            quote
        ));

        // One summary read serves both the funds ratio and the long/short
        // ratio.
        if let Some(summary) = self.account.summary().await {
            if summary.total_funds > Decimal::ZERO {
                notification.cumulative_quote_ratio_display = Some(decimal::percent(
                    ctx.cumulative_quote / summary.total_funds,
                ));
            }
            if scenario.state_label().contains("成交") {
                if let Some((display, raw)) =
                    long_short_ratio(summary.long_notional, summary.short_notional)
                {
                    notification.long_short_ratio_display = Some(display);
                    notification.long_short_ratio_raw = Some(raw);
                }
            }
        }

        Some(notification)
    }
}

/// Pick the display price by preference chain and format to 8 decimals.
fn display_price(source: PriceSource, event: &OrderEvent, ctx: &AggregationContext) -> String {
    let chain = match source {
        // Market executions always display their average regardless of the
        // scenario preference.
        _ if event.order_type == OrderType::Market => average_chain(event, ctx),
        PriceSource::Average => average_chain(event, ctx),
        PriceSource::Order => vec![
            event.order_price,
            event.stop_price,
            event.average_price,
            event.last_price,
        ],
    };
    let price = chain
        .into_iter()
        .find(|p| *p > Decimal::ZERO)
        .unwrap_or(Decimal::ZERO);
    decimal::fixed(price, 8)
}

fn average_chain(event: &OrderEvent, ctx: &AggregationContext) -> Vec<Decimal> {
    vec![
        event.average_price,
        ctx.last_average_price,
        event.last_price,
        event.order_price,
        event.stop_price,
    ]
}

/// Long/short notional ratio. `None` when the account is flat.
fn long_short_ratio(long: Decimal, short: Decimal) -> Option<(String, String)> {
    if long.is_zero() && short.is_zero() {
        return None;
    }
    if short.is_zero() {
        return Some(("∞:1.00".to_string(), "Infinity:1".to_string()));
    }
    let ratio = long / short;
    let display = format!("{}:1.00", decimal::fixed(ratio, 2));
    let raw = format!("{}:1", ratio.round_dp(2).normalize());
    Some((display, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tokio::time::timeout;
    use vigil_account::AccountSummary;
    use vigil_core::{OrderSide, PositionSide};

    struct StubAccount {
        summary: Option<Arc<AccountSummary>>,
        reads: std::sync::atomic::AtomicUsize,
    }

    impl StubAccount {
        fn with_funds(total: Decimal) -> Self {
            Self {
                summary: Some(Arc::new(AccountSummary {
                    total_funds: total,
                    fetched_at: Utc::now(),
                    positions: Default::default(),
                    long_notional: Decimal::ZERO,
                    short_notional: Decimal::ZERO,
                })),
                reads: Default::default(),
            }
        }

        fn with_positions(total: Decimal, long: Decimal, short: Decimal) -> Self {
            let mut stub = Self::with_funds(total);
            let summary = Arc::get_mut(stub.summary.as_mut().unwrap()).unwrap();
            summary.long_notional = long;
            summary.short_notional = short;
            stub
        }
    }

    #[async_trait]
    impl AccountSource for StubAccount {
        async fn summary(&self) -> Option<Arc<AccountSummary>> {
            self.reads
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.summary.clone()
        }
    }

    fn event(client_id: &str, status: OrderStatus) -> OrderEvent {
        OrderEvent {
            symbol: "BTCUSDT".to_string(),
            order_id: 1,
            client_order_id: client_id.to_string(),
            original_client_order_id: None,
            side: OrderSide::Buy,
            position_side: PositionSide::Both,
            order_type: OrderType::Limit,
            execution_type: if status == OrderStatus::New {
                "NEW".to_string()
            } else {
                "TRADE".to_string()
            },
            status,
            original_qty: dec!(1),
            cumulative_qty: dec!(1),
            last_qty: dec!(1),
            average_price: dec!(45000),
            last_price: dec!(45000),
            order_price: dec!(45000),
            stop_price: Decimal::ZERO,
            activation_price: None,
            callback_rate: None,
            realized_pnl: Decimal::ZERO,
            is_maker: false,
            event_time: Utc::now(),
            trade_time: Utc::now(),
        }
    }

    fn partial(client_id: &str, cum: Decimal, last: Decimal) -> OrderEvent {
        let mut e = event(client_id, OrderStatus::PartiallyFilled);
        e.cumulative_qty = cum;
        e.last_qty = last;
        // Distinct trade times keep retransmission dedup out of the way.
        e.trade_time = Utc::now();
        e
    }

    fn spawn(
        account: Arc<dyn AccountSource>,
    ) -> (
        OrderAggregatorHandle,
        mpsc::Receiver<OrderNotification>,
        JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::channel(64);
        let (handle, join) = spawn_order_aggregator(AggregatorConfig::default(), account, tx);
        (handle, rx, join)
    }

    async fn recv(rx: &mut mpsc::Receiver<OrderNotification>) -> OrderNotification {
        timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("notification within window")
            .expect("channel open")
    }

    #[tokio::test(start_paused = true)]
    async fn test_general_single_fill() {
        let account = Arc::new(StubAccount::with_funds(dec!(100000)));
        let (handle, mut rx, _join) = spawn(account);

        handle.submit(event("ORD-1", OrderStatus::Filled)).await.unwrap();
        let n = recv(&mut rx).await;

        assert_eq!(n.scenario, Some(Scenario::GeneralSingle));
        assert_eq!(n.title, "BTCUSDT-其他");
        assert_eq!(n.display_price, "45000.00000000");
        assert_eq!(n.cumulative_quote_display.as_deref(), Some("45000.00 USDT"));
        assert_eq!(n.cumulative_quote_ratio_display.as_deref(), Some("45.00%"));
        assert_eq!(n.trade_pnl_display.as_deref(), Some("0.00 USDT"));
        assert_eq!(n.long_short_ratio_display, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replayed_event_suppressed() {
        let account = Arc::new(StubAccount::with_funds(dec!(100000)));
        let (handle, mut rx, _join) = spawn(account);

        let fill = event("ORD-1", OrderStatus::Filled);
        handle.submit(fill.clone()).await.unwrap();
        handle.submit(fill).await.unwrap();

        let _first = recv(&mut rx).await;
        // Give the actor a chance to process the replay.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_general_aggregated_single_emission() {
        let account = Arc::new(StubAccount::with_funds(dec!(100000)));
        let reads = Arc::clone(&account);
        let (handle, mut rx, _join) = spawn(account);

        handle
            .submit(partial("ORD-2", dec!(0.5), dec!(0.5)))
            .await
            .unwrap();
        let mut fill = event("ORD-2", OrderStatus::Filled);
        fill.last_qty = dec!(0.5);
        handle.submit(fill).await.unwrap();

        let n = recv(&mut rx).await;
        assert_eq!(n.scenario, Some(Scenario::GeneralAggregated));
        assert_eq!(n.cumulative_quote_display.as_deref(), Some("45000.00 USDT"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(reads.reads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_rearm() {
        let account = Arc::new(StubAccount::with_funds(dec!(100000)));
        let (handle, mut rx, _join) = spawn(account);

        handle
            .submit(partial("ORD-3", dec!(0.4), dec!(0.4)))
            .await
            .unwrap();
        let n = recv(&mut rx).await;
        assert_eq!(n.scenario, Some(Scenario::GeneralTimeout));
        assert_eq!(n.state_label, "部分成交");
        assert_eq!(n.cumulative_quote_display.as_deref(), Some("18000.00 USDT"));

        // Same order partially fills again later; a second window elapses.
        tokio::time::advance(Duration::from_secs(5)).await;
        handle
            .submit(partial("ORD-3", dec!(0.2), dec!(0.2)))
            .await
            .unwrap();
        let n = recv(&mut rx).await;
        assert_eq!(n.scenario, Some(Scenario::GeneralTimeout));
        assert_eq!(n.cumulative_quote_display.as_deref(), Some("9000.00 USDT"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_child_suppresses_parent() {
        let account = Arc::new(StubAccount::with_funds(dec!(100000)));
        let (handle, mut rx, _join) = spawn(account);

        // Parent trigger order placed.
        let mut parent_new = event("TP-TRIG", OrderStatus::New);
        parent_new.order_type = OrderType::StopMarket;
        parent_new.order_price = Decimal::ZERO;
        parent_new.average_price = Decimal::ZERO;
        parent_new.stop_price = dec!(43000);
        parent_new.cumulative_qty = Decimal::ZERO;
        parent_new.last_qty = Decimal::ZERO;
        handle.submit(parent_new).await.unwrap();

        let n = recv(&mut rx).await;
        assert_eq!(n.scenario, Some(Scenario::SltpNew));
        assert_eq!(n.state_label, "创建");
        assert_eq!(n.display_price, "43000.00000000");
        assert_eq!(n.cumulative_quote_display, None);

        // Child execution NEW is quiet.
        let mut child_new = event("EXEC-123", OrderStatus::New);
        child_new.order_id = 2;
        child_new.order_type = OrderType::Market;
        child_new.original_client_order_id = Some("TP-TRIG".to_string());
        child_new.cumulative_qty = Decimal::ZERO;
        handle.submit(child_new).await.unwrap();

        // Child fill announces.
        let mut child_fill = event("EXEC-123", OrderStatus::Filled);
        child_fill.order_id = 2;
        child_fill.order_type = OrderType::Market;
        child_fill.original_client_order_id = Some("TP-TRIG".to_string());
        handle.submit(child_fill).await.unwrap();

        let n = recv(&mut rx).await;
        assert_eq!(n.scenario, Some(Scenario::SltpFilled));
        // Presentation inherited from the parent.
        assert_eq!(n.title, "BTCUSDT-止盈");

        // Parent's own fill is suppressed.
        handle.submit(event("TP-TRIG", OrderStatus::Filled)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_general_cancel_without_partial_is_silent() {
        let account = Arc::new(StubAccount::with_funds(dec!(100000)));
        let (handle, mut rx, _join) = spawn(account);

        let mut cancel = event("ORD-4", OrderStatus::Canceled);
        cancel.cumulative_qty = Decimal::ZERO;
        cancel.last_qty = Decimal::ZERO;
        handle.submit(cancel).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_short_ratio_on_fill() {
        let account = Arc::new(StubAccount::with_positions(
            dec!(100000),
            dec!(25000),
            dec!(10000),
        ));
        let (handle, mut rx, _join) = spawn(account);

        handle.submit(event("ORD-5", OrderStatus::Filled)).await.unwrap();
        let n = recv(&mut rx).await;
        assert_eq!(n.long_short_ratio_display.as_deref(), Some("2.50:1.00"));
        assert_eq!(n.long_short_ratio_raw.as_deref(), Some("2.5:1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_only_ratio_is_infinite() {
        let account = Arc::new(StubAccount::with_positions(
            dec!(100000),
            dec!(25000),
            Decimal::ZERO,
        ));
        let (handle, mut rx, _join) = spawn(account);

        handle.submit(event("ORD-6", OrderStatus::Filled)).await.unwrap();
        let n = recv(&mut rx).await;
        assert_eq!(n.long_short_ratio_display.as_deref(), Some("∞:1.00"));
        assert_eq!(n.long_short_ratio_raw.as_deref(), Some("Infinity:1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_replay_after_finalize_dropped() {
        let account = Arc::new(StubAccount::with_funds(dec!(100000)));
        let (handle, mut rx, _join) = spawn(account);

        handle.submit(event("ORD-7", OrderStatus::Filled)).await.unwrap();
        let _ = recv(&mut rx).await;

        // A late cancel for the same context inside the finalized horizon.
        let mut late = event("ORD-7", OrderStatus::Canceled);
        late.trade_time = Utc::now() + chrono::Duration::seconds(1);
        handle.submit(late).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
