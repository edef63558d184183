//! Error types for vigil-bot.

use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rules error: {0}")]
    Rules(#[from] vigil_rules::RulesError),

    #[error("REST error: {0}")]
    Rest(#[from] vigil_rest::RestError),

    #[error("Stream error: {0}")]
    Stream(#[from] vigil_stream::StreamError),

    #[error("Notify error: {0}")]
    Notify(#[from] vigil_notify::NotifyError),
}

/// Result type alias for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
