//! Per-order aggregation contexts.
//!
//! One context per `(symbol, orderId, clientOrderId)`, keyed by the
//! canonical composite string. The tracker is owned exclusively by the
//! aggregator task, so no locking is involved.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use vigil_core::{OrderCategory, OrderEvent, OrderStatus};

use crate::scenario::Scenario;

/// A scheduled window deadline for a context.
#[derive(Debug)]
pub struct PendingFlush {
    pub scenario: Scenario,
    /// Generation stamp; a flush message older than the current pending
    /// generation is stale and ignored.
    pub seq: u64,
    pub cancel: CancellationToken,
}

/// Mutable aggregation state for one order.
#[derive(Debug)]
pub struct AggregationContext {
    pub key: String,
    pub symbol: String,
    pub order_id: u64,
    pub client_order_id: String,
    /// Presentation cached at insertion.
    pub category: OrderCategory,
    pub cumulative_qty: Decimal,
    /// Quote-currency notional, recomputed on every event.
    pub cumulative_quote: Decimal,
    /// Last non-zero average price seen, used to backfill zero reports.
    pub last_average_price: Decimal,
    pub last_status: OrderStatus,
    pub last_event_time: DateTime<Utc>,
    /// Events that contributed to this context, in arrival order.
    pub events: Vec<OrderEvent>,
    pub had_partial_fill: bool,
    /// At most one pending deadline per context.
    pub pending: Option<PendingFlush>,
}

impl AggregationContext {
    fn new(event: &OrderEvent, category: OrderCategory) -> Self {
        Self {
            key: event.context_key(),
            symbol: event.symbol.clone(),
            order_id: event.order_id,
            client_order_id: event.client_order_id.clone(),
            category,
            cumulative_qty: Decimal::ZERO,
            cumulative_quote: Decimal::ZERO,
            last_average_price: Decimal::ZERO,
            last_status: event.status,
            last_event_time: event.event_time,
            events: Vec::new(),
            had_partial_fill: false,
            pending: None,
        }
    }

    fn apply(&mut self, event: &OrderEvent) {
        // Monotonic: the exchange never decreases cumulative quantity for
        // one order; a lower value is a stale retransmission.
        if event.cumulative_qty > self.cumulative_qty {
            self.cumulative_qty = event.cumulative_qty;
        }

        if event.average_price > Decimal::ZERO {
            self.last_average_price = event.average_price;
        }

        // Quote notional from average price, falling back to last price and
        // order price when the exchange reports a zero average.
        let price = [
            event.average_price,
            self.last_average_price,
            event.last_price,
            event.order_price,
        ]
        .into_iter()
        .find(|p| *p > Decimal::ZERO)
        .unwrap_or(Decimal::ZERO);
        self.cumulative_quote = price * self.cumulative_qty;

        self.last_status = event.status;
        self.last_event_time = event.event_time;
        self.had_partial_fill |= event.status == OrderStatus::PartiallyFilled;
        self.events.push(event.clone());
    }

    /// Realized PnL accumulated across contributing events. Each event's
    /// `rp` is treated as a delta.
    pub fn realized_pnl(&self) -> Decimal {
        self.events.iter().map(|e| e.realized_pnl).sum()
    }

    /// Cancel any scheduled deadline.
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
    }
}

/// In-memory context map. Deletion is driven by the aggregator's terminal
/// transitions; there is no background eviction.
#[derive(Debug, Default)]
pub struct OrderTracker {
    contexts: HashMap<String, AggregationContext>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a context with this event, stamping the presentation on
    /// insert, and return it.
    pub fn update(&mut self, event: &OrderEvent, category: &OrderCategory) -> &mut AggregationContext {
        let key = event.context_key();
        let ctx = self
            .contexts
            .entry(key.clone())
            .or_insert_with(|| {
                trace!(%key, "Creating aggregation context");
                AggregationContext::new(event, category.clone())
            });
        ctx.apply(event);
        ctx
    }

    pub fn get(&self, key: &str) -> Option<&AggregationContext> {
        self.contexts.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut AggregationContext> {
        self.contexts.get_mut(key)
    }

    /// Remove a context, cancelling any pending deadline.
    pub fn delete(&mut self, key: &str) -> Option<AggregationContext> {
        let mut ctx = self.contexts.remove(key)?;
        ctx.cancel_pending();
        trace!(%key, "Destroyed aggregation context");
        Some(ctx)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
