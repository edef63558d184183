//! Notification delivery.
//!
//! Provides:
//! - `WebhookSink`: JSON card POST with bounded retry/backoff
//! - card builders for order notifications and alert digests
//! - `NotificationDispatcher`: splits life-cycle and fill notifications to
//!   their sinks with an independent dedup horizon

pub mod card;
pub mod dispatcher;
pub mod error;
pub mod webhook;

pub use card::{digest_card, digest_color, expiry_reason, order_card, Card, CardColor, CardField};
pub use dispatcher::spawn_notification_dispatcher;
pub use error::{NotifyError, NotifyResult};
pub use webhook::WebhookSink;
