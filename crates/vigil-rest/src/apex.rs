//! Apex token-info client.
//!
//! Public market-data endpoint keyed by base asset. Numbers may arrive as
//! strings with thousands separators, so parsing is lenient.

use crate::error::{RestError, RestResult};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use vigil_core::decimal::parse_lenient;

const TOKEN_INFO_PATH: &str = "/bapi/apex/v1/friendly/apex/marketing/web/token-info";
const SUCCESS_CODE: &str = "000000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Token-level market observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenInfo {
    pub market_cap: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub hhi: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct TokenInfoEnvelope {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Client for the apex token-info endpoint.
pub struct ApexClient {
    http: Client,
    base_url: String,
}

impl ApexClient {
    pub fn new(base_url: impl Into<String>) -> RestResult<Self> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch token info for a base asset symbol (e.g. `BTC`).
    pub async fn token_info(&self, base_asset: &str) -> RestResult<TokenInfo> {
        let url = format!("{}{TOKEN_INFO_PATH}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", base_asset)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: TokenInfoEnvelope = response
            .json()
            .await
            .map_err(|e| RestError::Decode(format!("token-info: {e}")))?;

        if envelope.code != SUCCESS_CODE {
            return Err(RestError::Apex {
                code: envelope.code,
                message: envelope.message.unwrap_or_default(),
            });
        }

        let data = envelope.data.unwrap_or_default();
        let info = parse_token_info(&data);
        debug!(symbol = %base_asset, ?info, "Token info fetched");
        Ok(info)
    }
}

fn parse_token_info(data: &serde_json::Map<String, serde_json::Value>) -> TokenInfo {
    let field = |key: &str| data.get(key).and_then(|v| parse_lenient(v).ok());
    TokenInfo {
        market_cap: field("marketCap"),
        volume_24h: field("volume24h"),
        hhi: field("hhi"),
    }
}
