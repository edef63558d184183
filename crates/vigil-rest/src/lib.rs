//! REST clients for the futures exchange and the apex market-data service.
//!
//! Provides:
//! - `FuturesRestClient`: signed account/position endpoints (HMAC-SHA256
//!   query signing), unsigned premium-index/open-interest, and the
//!   listen-key lifecycle endpoints
//! - `ApexClient`: public token-info endpoint (market cap, 24h volume,
//!   concentration index)

pub mod apex;
pub mod client;
pub mod error;
pub mod types;

pub use apex::{ApexClient, TokenInfo};
pub use client::FuturesRestClient;
pub use error::{RestError, RestResult};
pub use types::{
    AccountInfo, AccountPosition, OpenInterest, PositionRisk, PremiumIndex,
};
