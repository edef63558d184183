//! Error types for vigil-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid numeric value: {0}")]
    InvalidNumber(String),

    #[error("Invalid event field: {0}")]
    InvalidEvent(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
