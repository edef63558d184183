//! Core domain types for the futures account monitor.
//!
//! This crate provides the types shared across the system:
//! - `OrderEvent`: typed projection of one user-data stream message
//! - `OrderCategory`: client-order-id classification (stop ladder conventions)
//! - `PositionSnapshot`, `AccountContext`: account state for validation
//! - `SymbolMetrics`: per-symbol market observations
//! - `ValidationIssue`, `AlertEvent`: rule-engine output and limiter events

pub mod classify;
pub mod decimal;
pub mod error;
pub mod event;
pub mod issue;
pub mod metrics;
pub mod position;

pub use classify::{classify, OrderCategory, OrderKind};
pub use error::{CoreError, Result};
pub use event::{OrderEvent, OrderSide, OrderStatus, OrderType, PositionSide};
pub use issue::{
    AlertEvent, IssueDirection, IssueKey, RuleKind, Severity, ValidationIssue, ACCOUNT_SCOPE,
};
pub use metrics::SymbolMetrics;
pub use position::{
    base_asset, quote_asset, AccountContext, MarginType, PositionDirection, PositionSnapshot,
};
