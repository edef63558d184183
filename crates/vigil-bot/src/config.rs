//! Application configuration from environment variables.

use crate::error::{AppError, AppResult};
use std::time::Duration;

const DEFAULT_REST_URL: &str = "https://fapi.binance.com";
const DEFAULT_WS_URL: &str = "wss://fstream.binance.com";
const DEFAULT_APEX_URL: &str = "https://www.binance.com";
const DEFAULT_RULES_PATH: &str = "config/position-rules.json";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_secret: String,
    pub rest_url: String,
    pub ws_url: String,
    pub apex_url: String,
    /// Webhook receiving order life-cycle cards.
    pub lifecycle_webhook_url: String,
    /// Webhook receiving fill cards.
    pub fill_webhook_url: String,
    /// Webhook receiving position-alert digests.
    pub alert_webhook_url: String,
    pub aggregation_window: Duration,
    pub listen_key_keep_alive: Duration,
    pub log_level: String,
    pub max_retry: u32,
    pub position_validation_interval: Duration,
    pub position_rules_config_path: String,
}

impl AppConfig {
    /// Load from the environment. Missing required variables or malformed
    /// numbers fail startup.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            api_key: required("VIGIL_API_KEY")?,
            api_secret: required("VIGIL_API_SECRET")?,
            rest_url: optional("VIGIL_REST_URL", DEFAULT_REST_URL),
            ws_url: optional("VIGIL_WS_URL", DEFAULT_WS_URL),
            apex_url: optional("VIGIL_APEX_URL", DEFAULT_APEX_URL),
            lifecycle_webhook_url: required("VIGIL_LIFECYCLE_WEBHOOK_URL")?,
            fill_webhook_url: required("VIGIL_FILL_WEBHOOK_URL")?,
            alert_webhook_url: required("VIGIL_ALERT_WEBHOOK_URL")?,
            aggregation_window: millis("AGGREGATION_WINDOW_MS", 10_000)?,
            listen_key_keep_alive: millis("LISTEN_KEY_KEEPALIVE_MS", 1_500_000)?,
            log_level: optional("LOG_LEVEL", "info"),
            max_retry: number("MAX_RETRY", 3)?,
            position_validation_interval: millis("POSITION_VALIDATION_INTERVAL_MS", 30_000)?,
            position_rules_config_path: optional("POSITION_RULES_CONFIG_PATH", DEFAULT_RULES_PATH),
        })
    }
}

fn required(name: &str) -> AppResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Config(format!("missing required env var {name}"))),
    }
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn number(name: &str, default: u32) -> AppResult<u32> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} must be an integer, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn millis(name: &str, default: u64) -> AppResult<Duration> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| AppError::Config(format!("{name} must be milliseconds, got {raw:?}"))),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}
