//! Signed REST client for the futures exchange.

use crate::error::{RestError, RestResult};
use crate::types::{AccountInfo, ListenKeyResponse, OpenInterest, PositionRisk, PremiumIndex};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Default timeout for REST requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Window the exchange accepts a signed request within.
const RECV_WINDOW_MS: u64 = 5000;

const ACCOUNT_ENDPOINT: &str = "/fapi/v2/account";
const POSITION_RISK_ENDPOINT: &str = "/fapi/v2/positionRisk";
const PREMIUM_INDEX_ENDPOINT: &str = "/fapi/v1/premiumIndex";
const OPEN_INTEREST_ENDPOINT: &str = "/fapi/v1/openInterest";
const LISTEN_KEY_ENDPOINT: &str = "/fapi/v1/listenKey";

/// REST client for the futures account and market endpoints.
///
/// Signed endpoints use HMAC-SHA256 over the query string (including
/// `timestamp` and `recvWindow`), hex-encoded and appended as `signature=`,
/// with the API key in the `X-MBX-APIKEY` header.
pub struct FuturesRestClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl FuturesRestClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> RestResult<Self> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        })
    }

    /// Fetch account totals and per-position initial margins.
    pub async fn account(&self) -> RestResult<AccountInfo> {
        self.signed_get(ACCOUNT_ENDPOINT, &[]).await
    }

    /// Fetch all open position risk rows.
    pub async fn position_risk(&self) -> RestResult<Vec<PositionRisk>> {
        self.signed_get(POSITION_RISK_ENDPOINT, &[]).await
    }

    /// Fetch premium index (mark price + predicted funding) for all symbols.
    pub async fn premium_index(&self) -> RestResult<Vec<PremiumIndex>> {
        self.unsigned_get(PREMIUM_INDEX_ENDPOINT, &[]).await
    }

    /// Fetch open interest for one symbol.
    pub async fn open_interest(&self, symbol: &str) -> RestResult<OpenInterest> {
        self.unsigned_get(OPEN_INTEREST_ENDPOINT, &[("symbol", symbol)])
            .await
    }

    /// Create a user-data stream listen key.
    pub async fn create_listen_key(&self) -> RestResult<String> {
        let url = format!("{}{}", self.base_url, LISTEN_KEY_ENDPOINT);
        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let payload: ListenKeyResponse = response
            .json()
            .await
            .map_err(|e| RestError::Decode(format!("listen key response: {e}")))?;
        debug!("Listen key created");
        Ok(payload.listen_key)
    }

    /// Extend a listen key's validity.
    pub async fn keep_alive_listen_key(&self, listen_key: &str) -> RestResult<()> {
        let url = format!("{}{}", self.base_url, LISTEN_KEY_ENDPOINT);
        let response = self
            .http
            .put(&url)
            .query(&[("listenKey", listen_key)])
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Destroy a listen key on shutdown.
    pub async fn close_listen_key(&self, listen_key: &str) -> RestResult<()> {
        let url = format!("{}{}", self.base_url, LISTEN_KEY_ENDPOINT);
        let response = self
            .http
            .delete(&url)
            .query(&[("listenKey", listen_key)])
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> RestResult<T> {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>();
        query.push(format!("timestamp={}", Utc::now().timestamp_millis()));
        query.push(format!("recvWindow={RECV_WINDOW_MS}"));
        let query = query.join("&");

        let signature = sign_query(&self.api_secret, &query)?;
        let url = format!("{}{path}?{query}&signature={signature}", self.base_url);

        let response = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| RestError::Decode(format!("{path}: {e}")))
    }

    async fn unsigned_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> RestResult<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.http.get(&url).query(params).send().await?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| RestError::Decode(format!("{path}: {e}")))
    }

    async fn check_status(response: reqwest::Response) -> RestResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RestError::AuthRejected {
                status: status.as_u16(),
                body,
            });
        }
        Err(RestError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// HMAC-SHA256 over the query string, hex-encoded.
fn sign_query(secret: &str, query: &str) -> RestResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| RestError::Signing(e.to_string()))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
