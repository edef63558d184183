//! Wire message normalization.
//!
//! Projects raw user-data messages (single-letter field names) into typed
//! [`OrderEvent`]s. Messages that fail validation are dropped silently;
//! unknown event types are ignored at debug level.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;
use vigil_core::{OrderEvent, OrderSide, OrderStatus, OrderType, PositionSide};

const ORDER_TRADE_UPDATE: &str = "ORDER_TRADE_UPDATE";
const LISTEN_KEY_EXPIRED: &str = "listenKeyExpired";

/// Normalized stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Order(OrderEvent),
    /// The exchange invalidated the listen key; the connection layer must
    /// re-create it and reconnect.
    ListenKeyExpired,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "E", default)]
    event_time: i64,
    #[serde(rename = "o")]
    order: Option<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    client_order_id: String,
    #[serde(rename = "C", default)]
    original_client_order_id: Option<String>,
    #[serde(rename = "S")]
    side: String,
    #[serde(rename = "ps", default)]
    position_side: Option<String>,
    #[serde(rename = "o")]
    order_type: String,
    #[serde(rename = "x")]
    execution_type: String,
    #[serde(rename = "X")]
    status: String,
    #[serde(rename = "i")]
    order_id: u64,
    #[serde(rename = "q", default)]
    original_qty: String,
    #[serde(rename = "z", default)]
    cumulative_qty: String,
    #[serde(rename = "l", default)]
    last_qty: String,
    #[serde(rename = "ap", default)]
    average_price: String,
    #[serde(rename = "L", default)]
    last_price: String,
    #[serde(rename = "p", default)]
    order_price: String,
    #[serde(rename = "sp", default)]
    stop_price: String,
    #[serde(rename = "AP", default)]
    activation_price: Option<String>,
    #[serde(rename = "cr", default)]
    callback_rate: Option<String>,
    #[serde(rename = "rp", default)]
    realized_pnl: Option<String>,
    #[serde(rename = "m", default)]
    is_maker: bool,
    #[serde(rename = "T", default)]
    trade_time: i64,
}

/// Normalize one raw frame. Returns `None` for invalid or irrelevant
/// messages (no error surfaces; malformed input must never stop the stream).
pub fn normalize(text: &str) -> Option<StreamEvent> {
    let envelope: RawEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(%err, "Dropping unparseable stream message");
            return None;
        }
    };

    match envelope.event_type.as_str() {
        LISTEN_KEY_EXPIRED => Some(StreamEvent::ListenKeyExpired),
        ORDER_TRADE_UPDATE => {
            let order = envelope.order?;
            project_order(order, envelope.event_time).map(StreamEvent::Order)
        }
        other => {
            debug!(event_type = %other, "Ignoring user-data event");
            None
        }
    }
}

fn project_order(raw: RawOrder, event_time_ms: i64) -> Option<OrderEvent> {
    let status = match OrderStatus::from_wire(&raw.status) {
        Some(status) => status,
        None => {
            debug!(status = %raw.status, "Dropping event with unknown status");
            return None;
        }
    };

    let side = match raw.side.as_str() {
        "BUY" => OrderSide::Buy,
        "SELL" => OrderSide::Sell,
        other => {
            debug!(side = %other, "Dropping event with unknown side");
            return None;
        }
    };

    let position_side = match raw.position_side.as_deref() {
        Some("LONG") => PositionSide::Long,
        Some("SHORT") => PositionSide::Short,
        _ => PositionSide::Both,
    };

    // The wire reports an empty string when there is no distinct parent.
    let original_client_order_id = raw
        .original_client_order_id
        .filter(|parent| !parent.is_empty());

    let realized_pnl = match raw.realized_pnl.as_deref() {
        None | Some("") => Decimal::ZERO,
        Some(rp) => Decimal::from_str(rp).unwrap_or_else(|err| {
            debug!(raw = %rp, %err, "Unparseable realized PnL, treating as 0");
            Decimal::ZERO
        }),
    };

    Some(OrderEvent {
        symbol: raw.symbol,
        order_id: raw.order_id,
        client_order_id: raw.client_order_id,
        original_client_order_id,
        side,
        position_side,
        order_type: OrderType::from_wire(&raw.order_type),
        execution_type: raw.execution_type,
        status,
        original_qty: required_decimal(&raw.original_qty)?,
        cumulative_qty: required_decimal(&raw.cumulative_qty)?,
        last_qty: required_decimal(&raw.last_qty)?,
        average_price: required_decimal(&raw.average_price)?,
        last_price: required_decimal(&raw.last_price)?,
        order_price: required_decimal(&raw.order_price)?,
        stop_price: required_decimal(&raw.stop_price)?,
        activation_price: optional_decimal(raw.activation_price.as_deref()),
        callback_rate: optional_decimal(raw.callback_rate.as_deref()),
        realized_pnl,
        is_maker: raw.is_maker,
        event_time: timestamp(event_time_ms),
        trade_time: timestamp(raw.trade_time),
    })
}

/// Empty strings (absent fields) read as zero; malformed values reject the
/// whole message.
fn required_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return Some(Decimal::ZERO);
    }
    Decimal::from_str(raw).ok()
}

fn optional_decimal(raw: Option<&str>) -> Option<Decimal> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| Decimal::from_str(s).ok())
}

fn timestamp(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}
