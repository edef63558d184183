//! Card payload rendering.
//!
//! Builds the structured JSON cards the chat webhooks consume. Order cards
//! render one notification; digest cards aggregate every alert/recovery
//! event of one validation tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_core::{decimal, AlertEvent, OrderStatus, Severity};
use vigil_orders::OrderNotification;

/// Header color of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    Green,
    Red,
    Orange,
    Blue,
}

/// One labeled line on a card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardField {
    pub label: String,
    pub value: String,
}

impl CardField {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// A webhook card payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub title: String,
    pub color: CardColor,
    pub fields: Vec<CardField>,
    pub sent_at: DateTime<Utc>,
}

impl Card {
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Null)
    }
}

/// Expiry reason string derived from the raw execution type.
pub fn expiry_reason(execution_type: &str) -> String {
    match execution_type {
        "EXPIRED_IN_MATCH" => "撮合过程中超时 (EXPIRED_IN_MATCH)".to_string(),
        "EXPIRED" => "超过有效期自动过期".to_string(),
        "" => "订单超时未成交".to_string(),
        other => format!("执行状态: {other}"),
    }
}

/// Render an order notification card.
pub fn order_card(notification: &OrderNotification) -> Card {
    let event = &notification.event;
    let mut fields = vec![
        CardField::new("状态", notification.state_label.clone()),
        CardField::new("来源", notification.source.clone()),
        CardField::new("方向", event.side.to_string()),
        CardField::new("价格", notification.display_price.clone()),
    ];

    if notification.cumulative_qty > rust_decimal::Decimal::ZERO {
        fields.push(CardField::new(
            "成交数量",
            decimal::fixed(notification.cumulative_qty, 8),
        ));
    }
    if let Some(quote) = &notification.cumulative_quote_display {
        fields.push(CardField::new("累计成交额", quote.clone()));
    }
    if let Some(ratio) = &notification.cumulative_quote_ratio_display {
        fields.push(CardField::new("资金占比", ratio.clone()));
    }
    if let Some(pnl) = &notification.trade_pnl_display {
        fields.push(CardField::new("已实现盈亏", pnl.clone()));
    }
    if let Some(ratio) = &notification.long_short_ratio_display {
        fields.push(CardField::new("多空比", ratio.clone()));
    }
    if event.status == OrderStatus::Expired {
        fields.push(CardField::new(
            "过期原因",
            expiry_reason(&event.execution_type),
        ));
    }

    Card {
        title: notification.title.clone(),
        color: order_color(&notification.state_label),
        fields,
        sent_at: Utc::now(),
    }
}

fn order_color(state_label: &str) -> CardColor {
    match state_label {
        "成交" | "部分成交" => CardColor::Green,
        "取消" | "过期" => CardColor::Orange,
        _ => CardColor::Blue,
    }
}

/// Render the per-tick alert digest card.
pub fn digest_card(events: &[AlertEvent]) -> Card {
    let mut fields = Vec::with_capacity(events.len() * 4);
    for event in events {
        let issue = event.issue();
        let status_label = if event.is_recovery() { "恢复" } else { "告警" };
        let title = format!(
            "{} {} [{}]",
            issue.base_asset,
            issue.rule.label(),
            issue.direction.label()
        );
        fields.push(CardField::new(status_label, title));
        fields.push(CardField::new("详情", issue.message.clone()));
        if let (Some(value), Some(threshold)) = (issue.value, issue.threshold) {
            fields.push(CardField::new(
                "观测/阈值",
                format!("{} / {}", value.normalize(), threshold.normalize()),
            ));
        }
        if let Some(details) = &issue.details {
            fields.push(CardField::new("补充", details.clone()));
        }
        let (first, triggered) = match event {
            AlertEvent::Alert {
                first_detected_at,
                triggered_at,
                ..
            }
            | AlertEvent::Recovery {
                first_detected_at,
                triggered_at,
                ..
            } => (first_detected_at, triggered_at),
        };
        fields.push(CardField::new(
            "时间",
            format!(
                "首次 {} / 触发 {}",
                first.format("%Y-%m-%d %H:%M:%S"),
                triggered.format("%Y-%m-%d %H:%M:%S")
            ),
        ));
    }

    Card {
        title: "持仓校验告警".to_string(),
        color: digest_color(events),
        fields,
        sent_at: Utc::now(),
    }
}

/// Header color rules: green when everything recovered, red when any
/// critical alert remains, orange for warnings, blue otherwise.
pub fn digest_color(events: &[AlertEvent]) -> CardColor {
    if !events.is_empty() && events.iter().all(AlertEvent::is_recovery) {
        return CardColor::Green;
    }
    if events
        .iter()
        .any(|e| !e.is_recovery() && e.issue().severity == Severity::Critical)
    {
        return CardColor::Red;
    }
    if events
        .iter()
        .any(|e| !e.is_recovery() && e.issue().severity == Severity::Warning)
    {
        return CardColor::Orange;
    }
    CardColor::Blue
}
