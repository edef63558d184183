//! Error types for vigil-orders.

use thiserror::Error;

/// Aggregation error types.
#[derive(Debug, Error)]
pub enum OrdersError {
    #[error("Aggregator channel closed")]
    ChannelClosed,
}

/// Result type alias for aggregation operations.
pub type OrdersResult<T> = std::result::Result<T, OrdersError>;
