//! Validation issues and alert events.

use crate::position::PositionDirection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope marker for account-wide issues.
pub const ACCOUNT_SCOPE: &str = "__account__";

/// Rule identifiers, in battery evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ConfigError,
    WhitelistViolation,
    BlacklistViolation,
    LeverageLimit,
    MarginShareLimit,
    FundingRateLimit,
    TotalMarginUsage,
    DataMissing,
    OiShareLimit,
    OiMinimum,
    MarketCapMinimum,
    Volume24hMinimum,
    ConcentrationHhiLimit,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "config_error",
            Self::WhitelistViolation => "whitelist_violation",
            Self::BlacklistViolation => "blacklist_violation",
            Self::LeverageLimit => "leverage_limit",
            Self::MarginShareLimit => "margin_share_limit",
            Self::FundingRateLimit => "funding_rate_limit",
            Self::TotalMarginUsage => "total_margin_usage",
            Self::DataMissing => "data_missing",
            Self::OiShareLimit => "oi_share_limit",
            Self::OiMinimum => "oi_minimum",
            Self::MarketCapMinimum => "market_cap_minimum",
            Self::Volume24hMinimum => "volume_24h_minimum",
            Self::ConcentrationHhiLimit => "concentration_hhi_limit",
        }
    }

    /// Display label used on digest cards.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConfigError => "配置冲突",
            Self::WhitelistViolation => "白名单违规",
            Self::BlacklistViolation => "黑名单违规",
            Self::LeverageLimit => "杠杆超限",
            Self::MarginShareLimit => "保证金占比超限",
            Self::FundingRateLimit => "资金费率超限",
            Self::TotalMarginUsage => "总保证金使用率超限",
            Self::DataMissing => "数据缺失",
            Self::OiShareLimit => "持仓占OI比例超限",
            Self::OiMinimum => "持仓量过低",
            Self::MarketCapMinimum => "市值过低",
            Self::Volume24hMinimum => "24小时成交量过低",
            Self::ConcentrationHhiLimit => "持仓集中度超限",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// Direction scope of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueDirection {
    Long,
    Short,
    Global,
}

impl From<PositionDirection> for IssueDirection {
    fn from(direction: PositionDirection) -> Self {
        match direction {
            PositionDirection::Long => Self::Long,
            PositionDirection::Short => Self::Short,
        }
    }
}

impl IssueDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Global => "global",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Long => "多头",
            Self::Short => "空头",
            Self::Global => "全局",
        }
    }
}

impl fmt::Display for IssueDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplication identity of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    pub rule: RuleKind,
    pub base_asset: String,
    pub direction: IssueDirection,
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.rule, self.base_asset, self.direction)
    }
}

/// One finding from the rule battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub rule: RuleKind,
    /// Base asset, or [`ACCOUNT_SCOPE`] for account-wide issues.
    pub base_asset: String,
    pub direction: IssueDirection,
    pub severity: Severity,
    pub message: String,
    pub cooldown_minutes: u32,
    pub notify_on_recovery: bool,
    pub value: Option<Decimal>,
    pub threshold: Option<Decimal>,
    pub details: Option<String>,
}

impl ValidationIssue {
    pub fn key(&self) -> IssueKey {
        IssueKey {
            rule: self.rule,
            base_asset: self.base_asset.clone(),
            direction: self.direction,
        }
    }
}

/// Output of the alert limiter for one validation tick.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    /// An issue crossed (or re-crossed after cooldown) the notify threshold.
    Alert {
        issue: ValidationIssue,
        /// True when this issue has been alerted before and the cooldown
        /// elapsed.
        repeat: bool,
        first_detected_at: DateTime<Utc>,
        triggered_at: DateTime<Utc>,
    },
    /// A previously alerted issue disappeared.
    Recovery {
        issue: ValidationIssue,
        first_detected_at: DateTime<Utc>,
        triggered_at: DateTime<Utc>,
    },
}

impl AlertEvent {
    pub fn issue(&self) -> &ValidationIssue {
        match self {
            Self::Alert { issue, .. } | Self::Recovery { issue, .. } => issue,
        }
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self, Self::Recovery { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(rule: RuleKind, asset: &str, direction: IssueDirection) -> ValidationIssue {
        ValidationIssue {
            rule,
            base_asset: asset.to_string(),
            direction,
            severity: Severity::Warning,
            message: String::new(),
            cooldown_minutes: 30,
            notify_on_recovery: true,
            value: None,
            threshold: None,
            details: None,
        }
    }

    #[test]
    fn test_issue_key_identity() {
        let a = issue(RuleKind::LeverageLimit, "ETH", IssueDirection::Long);
        let b = issue(RuleKind::LeverageLimit, "ETH", IssueDirection::Long);
        let c = issue(RuleKind::LeverageLimit, "ETH", IssueDirection::Short);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_rule_serde_names_match_wire() {
        let json = serde_json::to_string(&RuleKind::OiShareLimit).unwrap();
        assert_eq!(json, "\"oi_share_limit\"");
        assert_eq!(RuleKind::Volume24hMinimum.as_str(), "volume_24h_minimum");
    }

    #[test]
    fn test_alert_event_accessors() {
        let event = AlertEvent::Recovery {
            issue: issue(RuleKind::OiMinimum, "SOL", IssueDirection::Global),
            first_detected_at: Utc::now(),
            triggered_at: Utc::now(),
        };
        assert!(event.is_recovery());
        assert_eq!(event.issue().base_asset, "SOL");
    }
}
