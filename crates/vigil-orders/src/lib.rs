//! Order-event aggregation engine.
//!
//! The aggregator is a single-task actor consuming normalized order events
//! in stream order. It deduplicates retransmissions, tracks per-order
//! aggregation contexts, coalesces partial fills within a time window, and
//! emits one notification per logical order outcome.

pub mod aggregator;
pub mod error;
pub mod notification;
pub mod scenario;
pub mod tracker;
pub mod ttl;

pub use aggregator::{
    spawn_order_aggregator, AggregatorConfig, AggregatorMsg, OrderAggregatorHandle,
    OrderAggregatorTask,
};
pub use error::{OrdersError, OrdersResult};
pub use notification::OrderNotification;
pub use scenario::{PriceSource, Scenario};
pub use tracker::{AggregationContext, OrderTracker};
pub use ttl::TtlSet;
