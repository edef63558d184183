//! Notification payloads emitted by the aggregator.

use crate::scenario::Scenario;
use rust_decimal::Decimal;
use vigil_core::OrderEvent;

/// A fully-populated notification handed to the dispatcher.
///
/// Optional fields stay absent when their inputs are unavailable; the card
/// renderer never substitutes placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderNotification {
    /// The event that triggered the emission (for timed emissions, the last
    /// event that contributed).
    pub event: OrderEvent,
    /// Emission scenario; `None` for pass-through life-cycle events the
    /// aggregator does not announce itself (e.g. expiry).
    pub scenario: Option<Scenario>,
    /// Card title: `<symbol>-<suffix>`.
    pub title: String,
    /// Source label (止盈 / 止损 / 追踪止损 / 其他).
    pub source: String,
    /// Card state label (创建 / 部分成交 / 成交 / 取消 / 过期).
    pub state_label: String,
    /// Display price, 8 decimal places.
    pub display_price: String,
    pub cumulative_qty: Decimal,
    pub cumulative_quote: Decimal,
    /// `"<amount> <quote asset>"`.
    pub cumulative_quote_display: Option<String>,
    /// Share of account funds, e.g. `"45.00%"`.
    pub cumulative_quote_ratio_display: Option<String>,
    /// Signed realized PnL, e.g. `"+12.50 USDT"`.
    pub trade_pnl_display: Option<String>,
    /// `"2.50:1.00"` or `"∞:1.00"`.
    pub long_short_ratio_display: Option<String>,
    /// Raw ratio form, e.g. `"2.5:1"` or `"Infinity:1"`.
    pub long_short_ratio_raw: Option<String>,
}
