//! Error types for vigil-stream.

use thiserror::Error;

/// Stream error types.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection closed: code={code} reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Listen key unobtainable after {attempts} attempts: {last_error}")]
    ListenKeyExhausted { attempts: u32, last_error: String },
}

/// Result type alias for stream operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;
