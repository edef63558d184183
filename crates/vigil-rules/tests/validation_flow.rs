//! Engine → limiter → digest flow over the public API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vigil_core::{
    base_asset, AccountContext, MarginType, PositionDirection, PositionSnapshot, RuleKind,
    Severity,
};
use vigil_notify::{digest_card, digest_color, CardColor};
use vigil_rules::{parse_rules, AlertLimiter, PositionRuleEngine};

fn position(symbol: &str, direction: PositionDirection, leverage: Decimal) -> PositionSnapshot {
    PositionSnapshot {
        base_asset: base_asset(symbol),
        symbol: symbol.to_string(),
        position_amt: dec!(1),
        notional: dec!(500),
        leverage,
        initial_margin: dec!(100),
        isolated_margin: Decimal::ZERO,
        margin_type: MarginType::Cross,
        direction,
        mark_price: dec!(500),
        predicted_funding_rate: Some(dec!(0.0001)),
        updated_at: Utc::now(),
    }
}

fn context(snapshots: Vec<PositionSnapshot>) -> AccountContext {
    AccountContext {
        total_initial_margin: snapshots.iter().map(|p| p.initial_margin).sum(),
        total_margin_balance: dec!(1000),
        available_balance: dec!(900),
        snapshots,
        fetched_at: Utc::now(),
    }
}

fn at(minutes: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + minutes * 60, 0).unwrap()
}

#[test]
fn whitelisted_breach_alerts_then_recovers_green() {
    let rules = parse_rules(
        r#"{
            "defaults": {
                "whitelistLong": ["BTC"],
                "maxLeverage": 3,
                "maxMarginShare": 0.05
            }
        }"#,
    )
    .unwrap();
    let engine = PositionRuleEngine::new(rules);
    let mut limiter = AlertLimiter::new(None);

    // ETH long at 5x: whitelist violation + leverage + margin share.
    let breach = context(vec![position("ETHUSDT", PositionDirection::Long, dec!(5))]);
    let issues = engine.evaluate(&breach, None);
    let kinds: Vec<RuleKind> = issues.iter().map(|i| i.rule).collect();
    assert_eq!(
        kinds,
        vec![
            RuleKind::WhitelistViolation,
            RuleKind::LeverageLimit,
            RuleKind::MarginShareLimit,
        ]
    );

    let events = limiter.process(&issues, at(0));
    assert_eq!(events.len(), 3);

    // Any critical alert turns the digest red.
    assert_eq!(digest_color(&events), CardColor::Red);
    let card = digest_card(&events);
    assert_eq!(card.color, CardColor::Red);

    // Next tick, same issues: everything inside cooldown, nothing to post.
    let issues = engine.evaluate(&breach, None);
    assert!(limiter.process(&issues, at(1)).is_empty());

    // Position closed: three recoveries, all-green digest.
    let clean = context(vec![]);
    let issues = engine.evaluate(&clean, None);
    assert!(issues.is_empty());

    let events = limiter.process(&issues, at(2));
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.is_recovery()));
    assert_eq!(digest_color(&events), CardColor::Green);
}

#[test]
fn warning_only_digest_is_orange() {
    let rules = parse_rules(r#"{"defaults": {"maxLeverage": 3}}"#).unwrap();
    let engine = PositionRuleEngine::new(rules);
    let mut limiter = AlertLimiter::new(None);

    let ctx = context(vec![position("BTCUSDT", PositionDirection::Long, dec!(5))]);
    let issues = engine.evaluate(&ctx, None);
    assert!(issues.iter().all(|i| i.severity == Severity::Warning));

    let events = limiter.process(&issues, at(0));
    assert_eq!(digest_color(&events), CardColor::Orange);
}

#[test]
fn repeat_alert_after_floor_expires() {
    let rules = parse_rules(r#"{"defaults": {"maxLeverage": 3, "cooldownMinutes": 0}}"#).unwrap();
    let engine = PositionRuleEngine::new(rules);
    // Issues carry zero cooldown; the one-hour floor governs.
    let mut limiter = AlertLimiter::new(Some(std::time::Duration::from_secs(3600)));

    let ctx = context(vec![position("BTCUSDT", PositionDirection::Long, dec!(5))]);

    let events = limiter.process(&engine.evaluate(&ctx, None), at(0));
    assert_eq!(events.len(), 1);

    assert!(limiter.process(&engine.evaluate(&ctx, None), at(30)).is_empty());

    let events = limiter.process(&engine.evaluate(&ctx, None), at(61));
    assert_eq!(events.len(), 1);
    match &events[0] {
        vigil_core::AlertEvent::Alert { repeat, .. } => assert!(*repeat),
        other => panic!("expected repeat alert, got {other:?}"),
    }
}
