//! Error types for vigil-notify.

use thiserror::Error;

/// Notification error types.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Webhook rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Result type alias for notification operations.
pub type NotifyResult<T> = std::result::Result<T, NotifyError>;
