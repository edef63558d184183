//! Error types for vigil-account.

use thiserror::Error;

/// Account provider error types.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("REST error: {0}")]
    Rest(#[from] vigil_rest::RestError),
}

/// Result type alias for account operations.
pub type AccountResult<T> = std::result::Result<T, AccountError>;
