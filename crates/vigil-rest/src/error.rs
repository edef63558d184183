//! Error types for vigil-rest.

use thiserror::Error;

/// REST error types.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Auth rejected (HTTP {status}): {body}")]
    AuthRejected { status: u16, body: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Apex responded with code {code}: {message}")]
    Apex { code: String, message: String },
}

/// Result type alias for REST operations.
pub type RestResult<T> = std::result::Result<T, RestError>;
