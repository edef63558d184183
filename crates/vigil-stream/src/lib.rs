//! User-data stream client for the futures exchange.
//!
//! Provides:
//! - Listen-key lifecycle (create with retries, periodic keep-alive,
//!   destroy on shutdown)
//! - Automatic reconnection with exponential backoff and jitter
//! - `listenKeyExpired` handling (re-create key, reconnect without backoff)
//! - Event normalization: raw wire messages to typed `OrderEvent`s

pub mod connection;
pub mod error;
pub mod normalizer;

pub use connection::{StreamConfig, UserDataStream};
pub use error::{StreamError, StreamResult};
pub use normalizer::{normalize, StreamEvent};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
