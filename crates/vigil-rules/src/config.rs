//! Position-rules configuration.
//!
//! JSON shape: top-level `defaults` (optional) plus `overrides` mapping
//! asset ids to partial rules. Override keys follow explicit-presence
//! semantics: a present key overrides (even when `null`), an absent key
//! inherits the default. Asset ids are uppercased on load.

use crate::error::{RulesError, RulesResult};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Fallback cooldown when neither defaults nor override set one.
const DEFAULT_COOLDOWN_MINUTES: u32 = 30;

/// Fully resolved rule for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRule {
    pub whitelist_long: Option<Vec<String>>,
    pub whitelist_short: Option<Vec<String>>,
    pub blacklist_long: Option<Vec<String>>,
    pub blacklist_short: Option<Vec<String>>,
    pub max_leverage: Option<Decimal>,
    pub max_margin_share: Option<Decimal>,
    pub funding_threshold_long: Option<Decimal>,
    pub funding_threshold_short: Option<Decimal>,
    pub cooldown_minutes: u32,
    pub notify_recovery: bool,
    pub min_funding_rate_delta: Option<Decimal>,
}

impl Default for AssetRule {
    fn default() -> Self {
        Self {
            whitelist_long: None,
            whitelist_short: None,
            blacklist_long: None,
            blacklist_short: None,
            max_leverage: None,
            max_margin_share: None,
            funding_threshold_long: None,
            funding_threshold_short: None,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            notify_recovery: true,
            min_funding_rate_delta: None,
        }
    }
}

/// Partial rule parsed from one overrides entry. The outer `Option` records
/// key presence; the inner value carries the (possibly null) override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOverride {
    pub whitelist_long: Option<Option<Vec<String>>>,
    pub whitelist_short: Option<Option<Vec<String>>>,
    pub blacklist_long: Option<Option<Vec<String>>>,
    pub blacklist_short: Option<Option<Vec<String>>>,
    pub max_leverage: Option<Option<Decimal>>,
    pub max_margin_share: Option<Option<Decimal>>,
    pub funding_threshold_long: Option<Option<Decimal>>,
    pub funding_threshold_short: Option<Option<Decimal>>,
    pub cooldown_minutes: Option<u32>,
    pub notify_recovery: Option<bool>,
    pub min_funding_rate_delta: Option<Option<Decimal>>,
}

impl RuleOverride {
    fn apply(&self, base: &AssetRule) -> AssetRule {
        let mut rule = base.clone();
        if let Some(v) = &self.whitelist_long {
            rule.whitelist_long = v.clone();
        }
        if let Some(v) = &self.whitelist_short {
            rule.whitelist_short = v.clone();
        }
        if let Some(v) = &self.blacklist_long {
            rule.blacklist_long = v.clone();
        }
        if let Some(v) = &self.blacklist_short {
            rule.blacklist_short = v.clone();
        }
        if let Some(v) = &self.max_leverage {
            rule.max_leverage = *v;
        }
        if let Some(v) = &self.max_margin_share {
            rule.max_margin_share = *v;
        }
        if let Some(v) = &self.funding_threshold_long {
            rule.funding_threshold_long = *v;
        }
        if let Some(v) = &self.funding_threshold_short {
            rule.funding_threshold_short = *v;
        }
        if let Some(v) = self.cooldown_minutes {
            rule.cooldown_minutes = v;
        }
        if let Some(v) = self.notify_recovery {
            rule.notify_recovery = v;
        }
        if let Some(v) = &self.min_funding_rate_delta {
            rule.min_funding_rate_delta = *v;
        }
        rule
    }
}

/// Validated rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub defaults: AssetRule,
    pub overrides: HashMap<String, RuleOverride>,
    /// Defaults-only key: account-wide margin usage ceiling.
    pub total_margin_usage_limit: Option<Decimal>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            defaults: AssetRule::default(),
            overrides: HashMap::new(),
            total_margin_usage_limit: None,
        }
    }
}

impl RuleSet {
    /// Resolve the effective rule for one asset.
    pub fn resolve(&self, asset: &str) -> AssetRule {
        match self.overrides.get(&asset.to_uppercase()) {
            Some(partial) => partial.apply(&self.defaults),
            None => self.defaults.clone(),
        }
    }

    /// Assets that carry explicit overrides.
    pub fn configured_assets(&self) -> Vec<String> {
        let mut assets: Vec<String> = self.overrides.keys().cloned().collect();
        assets.sort();
        assets
    }
}

/// Load and validate a rules file.
pub fn load_rules(path: &Path) -> RulesResult<RuleSet> {
    let content = std::fs::read_to_string(path)?;
    parse_rules(&content)
}

/// Parse and validate a rules document.
pub fn parse_rules(json: &str) -> RulesResult<RuleSet> {
    let root: Value = serde_json::from_str(json)?;
    let root = root
        .as_object()
        .ok_or_else(|| RulesError::Config("top level must be an object".to_string()))?;

    let mut rule_set = RuleSet::default();

    if let Some(defaults) = root.get("defaults") {
        let defaults = defaults
            .as_object()
            .ok_or_else(|| RulesError::Config("defaults must be an object".to_string()))?;
        let partial = parse_override("defaults", defaults)?;
        rule_set.defaults = partial.apply(&AssetRule::default());
        // Defaults-only key: account-wide margin usage ceiling.
        rule_set.total_margin_usage_limit =
            parse_number("defaults", defaults, "totalMarginUsageLimit", |v| {
                (v > Decimal::ZERO).then_some(()).ok_or("must be positive")
            })?
            .flatten();
    }

    if let Some(overrides) = root.get("overrides") {
        let overrides = overrides
            .as_object()
            .ok_or_else(|| RulesError::Config("overrides must be an object".to_string()))?;
        for (asset, entry) in overrides {
            let entry = entry.as_object().ok_or_else(|| {
                RulesError::Config(format!("override for {asset} must be an object"))
            })?;
            let partial = parse_override(asset, entry)?;
            rule_set.overrides.insert(asset.to_uppercase(), partial);
        }
    }

    Ok(rule_set)
}

fn parse_override(scope: &str, entry: &Map<String, Value>) -> RulesResult<RuleOverride> {
    let mut partial = RuleOverride::default();

    partial.whitelist_long = parse_asset_list(scope, entry, "whitelistLong")?;
    partial.whitelist_short = parse_asset_list(scope, entry, "whitelistShort")?;
    partial.blacklist_long = parse_asset_list(scope, entry, "blacklistLong")?;
    partial.blacklist_short = parse_asset_list(scope, entry, "blacklistShort")?;

    partial.max_leverage = parse_number(scope, entry, "maxLeverage", |v| {
        (v > Decimal::ZERO).then_some(()).ok_or("must be positive")
    })?;
    partial.max_margin_share = parse_number(scope, entry, "maxMarginShare", |v| {
        (v > Decimal::ZERO && v <= Decimal::ONE)
            .then_some(())
            .ok_or("must be in (0, 1]")
    })?;
    partial.funding_threshold_long = parse_number(scope, entry, "fundingThresholdLong", |_| Ok(()))?;
    partial.funding_threshold_short =
        parse_number(scope, entry, "fundingThresholdShort", |_| Ok(()))?;
    partial.min_funding_rate_delta = parse_number(scope, entry, "minFundingRateDelta", |v| {
        (v >= Decimal::ZERO).then_some(()).ok_or("must be nonnegative")
    })?;

    if let Some(value) = entry.get("cooldownMinutes") {
        let minutes = value
            .as_u64()
            .ok_or_else(|| config_err(scope, "cooldownMinutes", "must be a nonnegative integer"))?;
        partial.cooldown_minutes = Some(
            u32::try_from(minutes)
                .map_err(|_| config_err(scope, "cooldownMinutes", "out of range"))?,
        );
    }

    if let Some(value) = entry.get("notifyRecovery") {
        partial.notify_recovery = Some(
            value
                .as_bool()
                .ok_or_else(|| config_err(scope, "notifyRecovery", "must be a boolean"))?,
        );
    }

    Ok(partial)
}

/// Asset list: present null or empty array both read as "no restriction";
/// entries are uppercased.
fn parse_asset_list(
    scope: &str,
    entry: &Map<String, Value>,
    key: &str,
) -> RulesResult<Option<Option<Vec<String>>>> {
    let Some(value) = entry.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(Some(None)),
        Value::Array(items) => {
            let mut assets = Vec::with_capacity(items.len());
            for item in items {
                let asset = item
                    .as_str()
                    .ok_or_else(|| config_err(scope, key, "entries must be strings"))?;
                assets.push(asset.to_uppercase());
            }
            Ok(Some((!assets.is_empty()).then_some(assets)))
        }
        _ => Err(config_err(scope, key, "must be an array or null")),
    }
}

fn parse_number(
    scope: &str,
    entry: &Map<String, Value>,
    key: &str,
    validate: impl Fn(Decimal) -> Result<(), &'static str>,
) -> RulesResult<Option<Option<Decimal>>> {
    let Some(value) = entry.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(Some(None)),
        _ => {
            let number = vigil_core::decimal::parse_lenient(value)
                .map_err(|_| config_err(scope, key, "must be a number or null"))?;
            validate(number).map_err(|reason| config_err(scope, key, reason))?;
            Ok(Some(Some(number)))
        }
    }
}

fn config_err(scope: &str, key: &str, reason: &str) -> RulesError {
    RulesError::Config(format!("{scope}.{key}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_and_overrides_resolve() {
        let rules = parse_rules(
            r#"{
                "defaults": {
                    "whitelistLong": ["btc", "eth"],
                    "maxLeverage": 3,
                    "totalMarginUsageLimit": 0.8,
                    "cooldownMinutes": 15
                },
                "overrides": {
                    "sol": { "maxLeverage": 10, "notifyRecovery": false }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(rules.total_margin_usage_limit, Some(dec!(0.8)));
        assert_eq!(
            rules.defaults.whitelist_long,
            Some(vec!["BTC".to_string(), "ETH".to_string()])
        );

        let sol = rules.resolve("SOL");
        assert_eq!(sol.max_leverage, Some(dec!(10)));
        assert!(!sol.notify_recovery);
        // Inherited from defaults.
        assert_eq!(sol.cooldown_minutes, 15);
        assert_eq!(
            sol.whitelist_long,
            Some(vec!["BTC".to_string(), "ETH".to_string()])
        );

        // Unconfigured asset resolves to defaults.
        let doge = rules.resolve("DOGE");
        assert_eq!(doge.max_leverage, Some(dec!(3)));
        assert_eq!(rules.configured_assets(), vec!["SOL"]);
    }

    #[test]
    fn test_present_null_overrides_absent_inherits() {
        let rules = parse_rules(
            r#"{
                "defaults": { "maxLeverage": 3, "maxMarginShare": 0.1 },
                "overrides": {
                    "ETH": { "maxLeverage": null }
                }
            }"#,
        )
        .unwrap();

        let eth = rules.resolve("ETH");
        // Present null clears the limit.
        assert_eq!(eth.max_leverage, None);
        // Absent key inherits.
        assert_eq!(eth.max_margin_share, Some(dec!(0.1)));
    }

    #[test]
    fn test_empty_list_reads_as_null() {
        let rules = parse_rules(
            r#"{
                "defaults": { "whitelistLong": ["BTC"] },
                "overrides": { "ETH": { "whitelistLong": [] } }
            }"#,
        )
        .unwrap();
        assert_eq!(rules.resolve("ETH").whitelist_long, None);
        assert_eq!(rules.resolve("BTC").whitelist_long, Some(vec!["BTC".to_string()]));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_rules(r#"{"defaults": {"maxLeverage": 0}}"#).is_err());
        assert!(parse_rules(r#"{"defaults": {"maxMarginShare": 1.5}}"#).is_err());
        assert!(parse_rules(r#"{"defaults": {"cooldownMinutes": -1}}"#).is_err());
        assert!(parse_rules(r#"{"defaults": {"whitelistLong": "BTC"}}"#).is_err());
        assert!(parse_rules(r#"[1,2,3]"#).is_err());
    }

    #[test]
    fn test_asset_ids_uppercased() {
        let rules = parse_rules(r#"{"overrides": {"pepe": {"maxLeverage": 2}}}"#).unwrap();
        assert!(rules.overrides.contains_key("PEPE"));
        assert_eq!(rules.resolve("pepe").max_leverage, Some(dec!(2)));
    }
}
