//! User-data stream connection manager.
//!
//! Owns the listen-key lifecycle and the WebSocket read loop, forwarding
//! normalized order events into an mpsc channel. Reconnects with exponential
//! backoff and jitter; a `listenKeyExpired` event re-creates the key and
//! reconnects without escalating the backoff.

use crate::error::{StreamError, StreamResult};
use crate::normalizer::{normalize, StreamEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigil_core::OrderEvent;
use vigil_rest::FuturesRestClient;

/// Attempts allowed when creating a listen key.
const LISTEN_KEY_CREATE_ATTEMPTS: u32 = 5;
/// Base delay of the listen-key create backoff.
const LISTEN_KEY_RETRY_BASE: Duration = Duration::from_millis(500);
/// Cap of the listen-key create backoff.
const LISTEN_KEY_RETRY_CAP: Duration = Duration::from_secs(5);

/// Stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket base URL (the listen key is appended as `/ws/<key>`).
    pub ws_base_url: String,
    /// Keep-alive cadence for the listen key.
    pub keep_alive_interval: Duration,
    /// Base delay for reconnect backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for reconnect backoff.
    pub reconnect_max_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_base_url: String::new(),
            keep_alive_interval: Duration::from_millis(1_500_000),
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60_000,
        }
    }
}

/// Why one connection attempt ended.
enum StreamExit {
    /// Shutdown requested; do not reconnect.
    Shutdown,
    /// The key expired (server event or failed keep-alive); re-create and
    /// reconnect immediately.
    ListenKeyExpired,
}

/// User-data stream manager.
pub struct UserDataStream {
    rest: Arc<FuturesRestClient>,
    config: StreamConfig,
    events_tx: mpsc::Sender<OrderEvent>,
    shutdown: CancellationToken,
}

impl UserDataStream {
    pub fn new(
        rest: Arc<FuturesRestClient>,
        config: StreamConfig,
        events_tx: mpsc::Sender<OrderEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rest,
            config,
            events_tx,
            shutdown,
        }
    }

    /// Create a listen key, retrying with backoff.
    ///
    /// Used both at startup (where exhaustion is a fatal error) and after
    /// key expiry mid-run.
    pub async fn acquire_listen_key(&self) -> StreamResult<String> {
        let mut last_error = String::new();
        for attempt in 1..=LISTEN_KEY_CREATE_ATTEMPTS {
            match self.rest.create_listen_key().await {
                Ok(key) => {
                    info!(attempt, "Listen key acquired");
                    return Ok(key);
                }
                Err(err) => {
                    last_error = err.to_string();
                    warn!(attempt, %err, "Listen key create failed");
                }
            }
            if attempt < LISTEN_KEY_CREATE_ATTEMPTS {
                let delay = LISTEN_KEY_RETRY_BASE
                    .saturating_mul(1 << (attempt - 1))
                    .min(LISTEN_KEY_RETRY_CAP);
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = self.shutdown.cancelled() => break,
                }
            }
        }
        Err(StreamError::ListenKeyExhausted {
            attempts: LISTEN_KEY_CREATE_ATTEMPTS,
            last_error,
        })
    }

    /// Run the stream until shutdown. Reconnects on errors; destroys the
    /// listen key on exit.
    pub async fn run(&self, initial_key: String) -> StreamResult<()> {
        let mut listen_key = initial_key;
        let mut attempt = 0u32;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.connect_and_stream(&listen_key).await {
                Ok(StreamExit::Shutdown) => break,
                Ok(StreamExit::ListenKeyExpired) => {
                    warn!("Listen key expired, re-creating");
                    match self.acquire_listen_key().await {
                        Ok(key) => {
                            listen_key = key;
                            attempt = 0;
                            continue;
                        }
                        Err(err) => error!(%err, "Listen key re-create failed"),
                    }
                }
                Err(err) => error!(%err, "User-data stream error"),
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            attempt += 1;
            let delay = backoff_delay(
                attempt,
                self.config.reconnect_base_delay_ms,
                self.config.reconnect_max_delay_ms,
            );
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting stream");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => break,
            }

            // The previous key may have lapsed while disconnected.
            if let Ok(key) = self.acquire_listen_key().await {
                listen_key = key;
            }
        }

        info!("Destroying listen key");
        if let Err(err) = self.rest.close_listen_key(&listen_key).await {
            warn!(%err, "Listen key destroy failed");
        }
        Ok(())
    }

    async fn connect_and_stream(&self, listen_key: &str) -> StreamResult<StreamExit> {
        let url = format!(
            "{}/ws/{listen_key}",
            self.config.ws_base_url.trim_end_matches('/')
        );
        info!("Connecting to user-data stream");

        let (ws_stream, _response) = connect_async(&url).await?;
        let (mut write, mut read) = ws_stream.split();
        info!("User-data stream connected");

        let mut keep_alive = tokio::time::interval(self.config.keep_alive_interval);
        keep_alive.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested, closing stream");
                    if let Err(err) = write.send(Message::Close(None)).await {
                        debug!(%err, "Close frame send failed during shutdown");
                    }
                    return Ok(StreamExit::Shutdown);
                }

                _ = keep_alive.tick() => {
                    match self.rest.keep_alive_listen_key(listen_key).await {
                        Ok(()) => debug!("Listen key keep-alive sent"),
                        Err(err) => {
                            warn!(%err, "Listen key keep-alive failed");
                            return Ok(StreamExit::ListenKeyExpired);
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match normalize(&text) {
                                Some(StreamEvent::ListenKeyExpired) => {
                                    return Ok(StreamExit::ListenKeyExpired);
                                }
                                Some(StreamEvent::Order(event)) => {
                                    if self.events_tx.send(event).await.is_err() {
                                        warn!("Event receiver dropped, stopping stream");
                                        return Ok(StreamExit::Shutdown);
                                    }
                                }
                                None => {}
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Stream closed by server");
                            return Err(StreamError::ConnectionClosed { code, reason });
                        }
                        Some(Err(err)) => {
                            error!(%err, "Stream read error");
                            return Err(err.into());
                        }
                        None => {
                            warn!("Stream ended");
                            return Err(StreamError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped, plus 0-1000ms jitter.
fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = base_ms.saturating_mul(1u64 << exponent).min(max_ms);
    Duration::from_millis(delay + jitter_ms())
}

/// Time-derived jitter (0-1000ms).
fn jitter_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}
