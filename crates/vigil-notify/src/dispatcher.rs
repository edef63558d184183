//! Notification dispatcher.
//!
//! Splits aggregator output between the life-cycle and fill webhooks.
//! Carries its own dedup horizon, independent of the aggregator's: this
//! path also sees events the aggregator does not announce itself.

use crate::card::order_card;
use crate::webhook::WebhookSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vigil_core::OrderStatus;
use vigil_orders::{OrderNotification, TtlSet};

/// Spawn the dispatcher task consuming aggregator notifications.
pub fn spawn_notification_dispatcher(
    mut rx: mpsc::Receiver<OrderNotification>,
    lifecycle_sink: Arc<WebhookSink>,
    fill_sink: Arc<WebhookSink>,
    dedup_ttl: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("NotificationDispatcher started");
        let mut dedup = TtlSet::new(dedup_ttl);

        while let Some(notification) = rx.recv().await {
            let dedup_key = notification.event.dedup_key();
            if dedup.contains(&dedup_key) {
                debug!(key = %dedup_key, "Duplicate notification dropped");
                continue;
            }
            dedup.insert(dedup_key);

            let card = order_card(&notification);
            let sink = match notification.event.status {
                OrderStatus::Filled | OrderStatus::PartiallyFilled => &fill_sink,
                _ => &lifecycle_sink,
            };

            info!(
                title = %card.title,
                state = %notification.state_label,
                scenario = ?notification.scenario,
                "Dispatching notification"
            );
            sink.post(&card.to_payload()).await;
        }

        debug!("NotificationDispatcher terminated");
    })
}
