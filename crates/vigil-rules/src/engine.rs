//! Position rule battery.
//!
//! Deterministic, idempotent evaluation of the account context against the
//! configured rules: per-asset checks first, then account-wide, then
//! per-symbol market checks.

use crate::config::{AssetRule, RuleSet};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::trace;
use vigil_core::{
    base_asset, AccountContext, IssueDirection, PositionDirection, RuleKind, Severity,
    SymbolMetrics, ValidationIssue, ACCOUNT_SCOPE,
};

/// Position share of open interest above which concentration is critical.
const OI_SHARE_THRESHOLD: &str = "0.02";
/// Minimum acceptable open-interest notional.
const MIN_OPEN_INTEREST: &str = "2000000";
/// Minimum acceptable market cap.
const MIN_MARKET_CAP: &str = "50000000";
/// Minimum acceptable 24h volume.
const MIN_VOLUME_24H: &str = "1000000";
/// Maximum acceptable concentration index.
const MAX_HHI: &str = "0.2";

fn threshold(raw: &str) -> Decimal {
    raw.parse().unwrap_or(Decimal::ZERO)
}

/// The rule engine.
pub struct PositionRuleEngine {
    rules: RuleSet,
}

impl PositionRuleEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Evaluate the full battery. Issues appear in declared evaluation
    /// order; identical inputs always produce identical output.
    pub fn evaluate(
        &self,
        ctx: &AccountContext,
        metrics: Option<&HashMap<String, SymbolMetrics>>,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        // Asset set: configured assets plus anything currently held.
        let mut assets = self.rules.configured_assets();
        for asset in ctx.assets_with_positions() {
            if !assets.contains(&asset) {
                assets.push(asset);
            }
        }
        assets.sort();

        for asset in &assets {
            let rule = self.rules.resolve(asset);
            self.check_asset(ctx, asset, &rule, &mut issues);
        }

        self.check_account(ctx, &mut issues);

        if let Some(metrics) = metrics {
            for symbol in ctx.symbols_with_positions() {
                let rule = self.rules.resolve(&base_asset(&symbol));
                self.check_symbol(ctx, &symbol, metrics.get(&symbol), &rule, &mut issues);
            }
        }

        trace!(count = issues.len(), "Rule battery evaluated");
        issues
    }

    fn check_asset(
        &self,
        ctx: &AccountContext,
        asset: &str,
        rule: &AssetRule,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for direction in [PositionDirection::Long, PositionDirection::Short] {
            let (whitelist, blacklist) = match direction {
                PositionDirection::Long => (&rule.whitelist_long, &rule.blacklist_long),
                PositionDirection::Short => (&rule.whitelist_short, &rule.blacklist_short),
            };
            let has_positions = ctx.positions_of(asset, direction).next().is_some();
            let contains = |list: &Option<Vec<String>>| {
                list.as_ref().is_some_and(|l| l.iter().any(|a| a == asset))
            };

            // The asset listed in both its own direction's lists is a
            // configuration conflict regardless of positions.
            if contains(whitelist) && contains(blacklist) {
                issues.push(issue(
                    RuleKind::ConfigError,
                    asset,
                    direction.into(),
                    Severity::Critical,
                    format!("{asset} 同时出现在{}白名单与黑名单", direction_label(direction)),
                    rule,
                ));
            }

            if whitelist.is_some() && !contains(whitelist) && has_positions {
                issues.push(issue(
                    RuleKind::WhitelistViolation,
                    asset,
                    direction.into(),
                    Severity::Critical,
                    format!("{asset} 不在{}白名单内", direction_label(direction)),
                    rule,
                ));
            }

            if contains(blacklist) && has_positions {
                issues.push(issue(
                    RuleKind::BlacklistViolation,
                    asset,
                    direction.into(),
                    Severity::Critical,
                    format!("{asset} 在{}黑名单内", direction_label(direction)),
                    rule,
                ));
            }
        }

        if let Some(max_leverage) = rule.max_leverage {
            for direction in [PositionDirection::Long, PositionDirection::Short] {
                let worst = ctx
                    .positions_of(asset, direction)
                    .map(|p| p.leverage)
                    .max();
                if let Some(leverage) = worst {
                    if leverage > max_leverage {
                        issues.push(
                            issue(
                                RuleKind::LeverageLimit,
                                asset,
                                direction.into(),
                                Severity::Warning,
                                format!("{asset} 杠杆 {leverage} 超过上限 {max_leverage}"),
                                rule,
                            )
                            .with_values(leverage, max_leverage),
                        );
                    }
                }
            }
        }

        if let Some(max_share) = rule.max_margin_share {
            if ctx.total_margin_balance > Decimal::ZERO {
                for direction in [PositionDirection::Long, PositionDirection::Short] {
                    let margin: Decimal = ctx
                        .positions_of(asset, direction)
                        .map(|p| p.initial_margin.abs())
                        .sum();
                    let share = margin / ctx.total_margin_balance;
                    if share > max_share {
                        issues.push(
                            issue(
                                RuleKind::MarginShareLimit,
                                asset,
                                direction.into(),
                                Severity::Warning,
                                format!(
                                    "{asset} {}保证金占比 {} 超过上限 {max_share}",
                                    direction_label(direction),
                                    share.round_dp(4).normalize()
                                ),
                                rule,
                            )
                            .with_values(share, max_share),
                        );
                    }
                }
            }
        }

        self.check_funding(ctx, asset, rule, issues);
    }

    fn check_funding(
        &self,
        ctx: &AccountContext,
        asset: &str,
        rule: &AssetRule,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for direction in [PositionDirection::Short, PositionDirection::Long] {
            let threshold = match direction {
                PositionDirection::Short => rule.funding_threshold_short,
                PositionDirection::Long => rule.funding_threshold_long,
            };
            let Some(threshold) = threshold else {
                continue;
            };
            for position in ctx.positions_of(asset, direction) {
                match position.predicted_funding_rate {
                    Some(rate) => {
                        // Shorts suffer when funding drops below the floor;
                        // longs when it climbs above the ceiling.
                        let breached = match direction {
                            PositionDirection::Short => rate < threshold,
                            PositionDirection::Long => rate > threshold,
                        };
                        if breached {
                            issues.push(
                                issue(
                                    RuleKind::FundingRateLimit,
                                    asset,
                                    direction.into(),
                                    Severity::Warning,
                                    format!(
                                        "{} 资金费率 {} 越过阈值 {threshold}",
                                        position.symbol,
                                        rate.normalize()
                                    ),
                                    rule,
                                )
                                .with_values(rate, threshold),
                            );
                            break;
                        }
                    }
                    None => {
                        issues.push(issue(
                            RuleKind::DataMissing,
                            asset,
                            direction.into(),
                            Severity::Warning,
                            format!("{} 缺少资金费率数据", position.symbol),
                            rule,
                        ));
                        break;
                    }
                }
            }
        }
    }

    fn check_account(&self, ctx: &AccountContext, issues: &mut Vec<ValidationIssue>) {
        let defaults = &self.rules.defaults;
        if ctx.total_margin_balance <= Decimal::ZERO {
            issues.push(issue(
                RuleKind::DataMissing,
                ACCOUNT_SCOPE,
                IssueDirection::Global,
                Severity::Critical,
                "账户总保证金余额缺失或为零".to_string(),
                defaults,
            ));
            return;
        }

        if let Some(limit) = self.rules.total_margin_usage_limit {
            let used: Decimal = ctx
                .snapshots
                .iter()
                .map(|p| p.initial_margin.abs())
                .sum();
            let usage = used / ctx.total_margin_balance;
            if usage > limit {
                issues.push(
                    issue(
                        RuleKind::TotalMarginUsage,
                        ACCOUNT_SCOPE,
                        IssueDirection::Global,
                        Severity::Critical,
                        format!(
                            "总保证金使用率 {} 超过上限 {limit}",
                            usage.round_dp(4).normalize()
                        ),
                        defaults,
                    )
                    .with_values(usage, limit),
                );
            }
        }
    }

    fn check_symbol(
        &self,
        ctx: &AccountContext,
        symbol: &str,
        metrics: Option<&SymbolMetrics>,
        rule: &AssetRule,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let asset = base_asset(symbol);
        let position_notional: Decimal = ctx
            .snapshots
            .iter()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.notional.abs())
            .sum();

        let mut missing: Vec<&'static str> = Vec::new();
        let metrics = metrics.cloned().unwrap_or_default();

        match metrics.open_interest_notional {
            Some(oi_notional) if oi_notional > Decimal::ZERO => {
                let share = position_notional / oi_notional;
                if share > threshold(OI_SHARE_THRESHOLD) {
                    issues.push(
                        issue(
                            RuleKind::OiShareLimit,
                            &asset,
                            IssueDirection::Global,
                            Severity::Critical,
                            format!(
                                "{symbol} 持仓占OI比例 {} 超过 {}",
                                share.round_dp(4).normalize(),
                                OI_SHARE_THRESHOLD
                            ),
                            rule,
                        )
                        .with_values(share, threshold(OI_SHARE_THRESHOLD)),
                    );
                }
                if oi_notional < threshold(MIN_OPEN_INTEREST) {
                    issues.push(
                        issue(
                            RuleKind::OiMinimum,
                            &asset,
                            IssueDirection::Global,
                            Severity::Warning,
                            format!("{symbol} 持仓量名义价值 {} 过低", oi_notional.normalize()),
                            rule,
                        )
                        .with_values(oi_notional, threshold(MIN_OPEN_INTEREST)),
                    );
                }
            }
            _ => missing.push("持仓名义价值"),
        }

        match metrics.market_cap {
            Some(market_cap) => {
                if market_cap < threshold(MIN_MARKET_CAP) {
                    issues.push(
                        issue(
                            RuleKind::MarketCapMinimum,
                            &asset,
                            IssueDirection::Global,
                            Severity::Warning,
                            format!("{asset} 市值 {} 过低", market_cap.normalize()),
                            rule,
                        )
                        .with_values(market_cap, threshold(MIN_MARKET_CAP)),
                    );
                }
            }
            None => missing.push("市值"),
        }

        match metrics.volume_24h {
            Some(volume) => {
                if volume < threshold(MIN_VOLUME_24H) {
                    issues.push(
                        issue(
                            RuleKind::Volume24hMinimum,
                            &asset,
                            IssueDirection::Global,
                            Severity::Warning,
                            format!("{asset} 24小时成交量 {} 过低", volume.normalize()),
                            rule,
                        )
                        .with_values(volume, threshold(MIN_VOLUME_24H)),
                    );
                }
            }
            None => missing.push("24小时成交量"),
        }

        match metrics.hhi {
            Some(hhi) => {
                if hhi > threshold(MAX_HHI) {
                    issues.push(
                        issue(
                            RuleKind::ConcentrationHhiLimit,
                            &asset,
                            IssueDirection::Global,
                            Severity::Warning,
                            format!("{asset} 持仓集中度 {} 超过 {}", hhi.normalize(), MAX_HHI),
                            rule,
                        )
                        .with_values(hhi, threshold(MAX_HHI)),
                    );
                }
            }
            None => missing.push("集中度HHI"),
        }

        if !missing.is_empty() {
            issues.push(issue(
                RuleKind::DataMissing,
                &asset,
                IssueDirection::Global,
                Severity::Warning,
                format!("{symbol} 缺少市场数据: {}", missing.join("、")),
                rule,
            ));
        }
    }
}

fn issue(
    rule_kind: RuleKind,
    asset: &str,
    direction: IssueDirection,
    severity: Severity,
    message: String,
    rule: &AssetRule,
) -> ValidationIssue {
    ValidationIssue {
        rule: rule_kind,
        base_asset: asset.to_string(),
        direction,
        severity,
        message,
        cooldown_minutes: rule.cooldown_minutes,
        notify_on_recovery: rule.notify_recovery,
        value: None,
        threshold: None,
        details: None,
    }
}

trait WithValues {
    fn with_values(self, value: Decimal, threshold: Decimal) -> Self;
}

impl WithValues for ValidationIssue {
    fn with_values(mut self, value: Decimal, threshold: Decimal) -> Self {
        self.value = Some(value);
        self.threshold = Some(threshold);
        self
    }
}

fn direction_label(direction: PositionDirection) -> &'static str {
    match direction {
        PositionDirection::Long => "多头",
        PositionDirection::Short => "空头",
    }
}
