//! Error types for vigil-rules.

use thiserror::Error;

/// Rules error types.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Failed to read rules config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid rules config: {0}")]
    Config(String),

    #[error("Rules config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for rules operations.
pub type RulesResult<T> = std::result::Result<T, RulesError>;
