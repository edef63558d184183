//! Position validation.
//!
//! Provides:
//! - rules configuration (defaults + per-asset overrides with explicit
//!   key-presence semantics)
//! - `PositionRuleEngine`: the deterministic rule battery
//! - `AlertLimiter`: per-issue cooldown and recovery tracking
//! - `ValidationService`: the periodic fetch → evaluate → limit → digest loop

pub mod config;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod service;

pub use config::{load_rules, parse_rules, AssetRule, RuleOverride, RuleSet};
pub use engine::PositionRuleEngine;
pub use limiter::AlertLimiter;
pub use error::{RulesError, RulesResult};
pub use service::{ValidationService, ValidationServiceConfig};
