//! Order event types projected from the user-data stream.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Position side in hedge or one-way mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
    Both,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Both => write!(f, "BOTH"),
        }
    }
}

/// Order status as reported by the exchange.
///
/// `EXPIRED_IN_MATCH` is normalized to `Expired` at projection time; the raw
/// execution-type string is kept on the event for expiry-reason rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    PendingCancel,
    Rejected,
}

impl OrderStatus {
    /// Parse a wire status string. Unknown statuses return `None`.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "NEW" => Some(Self::New),
            "PARTIALLY_FILLED" => Some(Self::PartiallyFilled),
            "FILLED" => Some(Self::Filled),
            "CANCELED" => Some(Self::Canceled),
            "EXPIRED" | "EXPIRED_IN_MATCH" => Some(Self::Expired),
            "PENDING_CANCEL" => Some(Self::PendingCancel),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Terminal statuses end an aggregation context.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Expired | Self::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Expired => "EXPIRED",
            Self::PendingCancel => "PENDING_CANCEL",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopMarket,
    TakeProfit,
    TakeProfitMarket,
    TrailingStopMarket,
    Liquidation,
    /// Unrecognized wire value, preserved verbatim.
    Other(String),
}

impl OrderType {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "MARKET" => Self::Market,
            "LIMIT" => Self::Limit,
            "STOP" => Self::Stop,
            "STOP_MARKET" => Self::StopMarket,
            "TAKE_PROFIT" => Self::TakeProfit,
            "TAKE_PROFIT_MARKET" => Self::TakeProfitMarket,
            "TRAILING_STOP_MARKET" => Self::TrailingStopMarket,
            "LIQUIDATION" => Self::Liquidation,
            other => Self::Other(other.to_string()),
        }
    }

    /// Plain execution orders; everything else is a trigger-style order.
    pub fn is_market_or_limit(&self) -> bool {
        matches!(self, Self::Market | Self::Limit)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::Stop => "STOP",
            Self::StopMarket => "STOP_MARKET",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::TakeProfitMarket => "TAKE_PROFIT_MARKET",
            Self::TrailingStopMarket => "TRAILING_STOP_MARKET",
            Self::Liquidation => "LIQUIDATION",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable projection of one `ORDER_TRADE_UPDATE` stream message.
///
/// Numeric fields are carried as `Decimal` parsed from the exchange's string
/// encoding, so scale is preserved up to display.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub symbol: String,
    pub order_id: u64,
    pub client_order_id: String,
    /// Present on child executions spawned by a triggered stop order; points
    /// at the parent's client order id.
    pub original_client_order_id: Option<String>,
    pub side: OrderSide,
    pub position_side: PositionSide,
    pub order_type: OrderType,
    /// Raw execution-type string (`NEW`, `TRADE`, `EXPIRED`, ...), kept for
    /// expiry-reason rendering and dedup keying.
    pub execution_type: String,
    pub status: OrderStatus,
    pub original_qty: Decimal,
    pub cumulative_qty: Decimal,
    pub last_qty: Decimal,
    pub average_price: Decimal,
    pub last_price: Decimal,
    pub order_price: Decimal,
    pub stop_price: Decimal,
    pub activation_price: Option<Decimal>,
    pub callback_rate: Option<Decimal>,
    /// Realized PnL delta for this event; lenient-parsed, 0 on failure.
    pub realized_pnl: Decimal,
    pub is_maker: bool,
    pub event_time: DateTime<Utc>,
    pub trade_time: DateTime<Utc>,
}

impl OrderEvent {
    /// Canonical aggregation-context key.
    pub fn context_key(&self) -> String {
        format!("{}:{}:{}", self.symbol, self.order_id, self.client_order_id)
    }

    /// Wire-level dedup key: identity plus the fields that distinguish a
    /// retransmission from a genuine follow-up update.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.symbol,
            self.order_id,
            self.client_order_id,
            self.status,
            self.execution_type,
            self.trade_time.timestamp_millis(),
            self.last_qty,
            self.cumulative_qty,
        )
    }

    /// Whether this event belongs to a child execution of a triggered stop.
    pub fn is_child_execution(&self) -> bool {
        self.original_client_order_id
            .as_deref()
            .is_some_and(|parent| parent != self.client_order_id)
    }
}
