//! Alert limiter: per-issue cooldown and recovery tracking.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, trace};
use vigil_core::{AlertEvent, IssueKey, ValidationIssue};

/// Tracked state for one live issue.
#[derive(Debug, Clone)]
struct AlertState {
    last_issue: ValidationIssue,
    first_detected_at: DateTime<Utc>,
    last_sent_at: DateTime<Utc>,
    notify_on_recovery: bool,
}

/// Cooldown-aware limiter keyed by `(rule, baseAsset, direction)`.
///
/// One `alert` fires on first sighting; repeats are suppressed until the
/// effective cooldown elapses. An issue that disappears emits a `recovery`
/// (when configured) and drops its state either way.
pub struct AlertLimiter {
    states: HashMap<IssueKey, AlertState>,
    /// Optional floor applied under every issue's own cooldown.
    cooldown_floor: Option<Duration>,
}

impl AlertLimiter {
    pub fn new(cooldown_floor: Option<std::time::Duration>) -> Self {
        Self {
            states: HashMap::new(),
            cooldown_floor: cooldown_floor
                .and_then(|d| Duration::from_std(d).ok()),
        }
    }

    /// Process one tick's issues. Returns alerts in input order, then
    /// recoveries.
    pub fn process(&mut self, issues: &[ValidationIssue], now: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        let mut seen: Vec<IssueKey> = Vec::with_capacity(issues.len());

        for issue in issues {
            let key = issue.key();
            seen.push(key.clone());
            let cooldown = self.effective_cooldown(issue);

            match self.states.get_mut(&key) {
                None => {
                    self.states.insert(
                        key,
                        AlertState {
                            last_issue: issue.clone(),
                            first_detected_at: now,
                            last_sent_at: now,
                            notify_on_recovery: issue.notify_on_recovery,
                        },
                    );
                    events.push(AlertEvent::Alert {
                        issue: issue.clone(),
                        repeat: false,
                        first_detected_at: now,
                        triggered_at: now,
                    });
                }
                Some(state) => {
                    state.last_issue = issue.clone();
                    state.notify_on_recovery = issue.notify_on_recovery;

                    if now - state.last_sent_at >= cooldown {
                        state.last_sent_at = now;
                        events.push(AlertEvent::Alert {
                            issue: issue.clone(),
                            repeat: true,
                            first_detected_at: state.first_detected_at,
                            triggered_at: now,
                        });
                    } else {
                        trace!(key = %issue.key(), "Alert suppressed within cooldown");
                    }
                }
            }
        }

        // Issues absent this tick: recover and drop state. Keys sorted for
        // a stable digest order.
        let mut gone: Vec<IssueKey> = self
            .states
            .keys()
            .filter(|key| !seen.contains(key))
            .cloned()
            .collect();
        gone.sort_by_key(|key| key.to_string());

        for key in gone {
            if let Some(state) = self.states.remove(&key) {
                if state.notify_on_recovery {
                    debug!(%key, "Issue recovered");
                    events.push(AlertEvent::Recovery {
                        issue: state.last_issue,
                        first_detected_at: state.first_detected_at,
                        triggered_at: now,
                    });
                }
            }
        }

        events
    }

    fn effective_cooldown(&self, issue: &ValidationIssue) -> Duration {
        let own = Duration::minutes(i64::from(issue.cooldown_minutes));
        match self.cooldown_floor {
            Some(floor) if floor > own => floor,
            _ => own,
        }
    }

    /// Number of currently tracked issues.
    pub fn active(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{IssueDirection, RuleKind, Severity};

    fn issue(cooldown_minutes: u32, notify_on_recovery: bool) -> ValidationIssue {
        ValidationIssue {
            rule: RuleKind::LeverageLimit,
            base_asset: "ETH".to_string(),
            direction: IssueDirection::Long,
            severity: Severity::Warning,
            message: "杠杆超限".to_string(),
            cooldown_minutes,
            notify_on_recovery,
            value: None,
            threshold: None,
            details: None,
        }
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + minutes * 60, 0).unwrap()
    }

    #[test]
    fn test_first_sighting_alerts_once() {
        let mut limiter = AlertLimiter::new(None);
        let issues = vec![issue(30, true)];

        let events = limiter.process(&issues, at(0));
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            AlertEvent::Alert { repeat: false, .. }
        ));

        // Still inside cooldown: suppressed.
        let events = limiter.process(&issues, at(10));
        assert!(events.is_empty());

        // Past cooldown: repeat alert.
        let events = limiter.process(&issues, at(31));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AlertEvent::Alert { repeat: true, .. }));
    }

    #[test]
    fn test_cooldown_floor_applies() {
        let mut limiter = AlertLimiter::new(Some(std::time::Duration::from_secs(3600)));
        let issues = vec![issue(0, true)];

        let events = limiter.process(&issues, at(0));
        assert_eq!(events.len(), 1);

        // 30 minutes later: the one-hour floor still suppresses.
        assert!(limiter.process(&issues, at(30)).is_empty());

        // 61 minutes: repeat fires.
        let events = limiter.process(&issues, at(61));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AlertEvent::Alert { repeat: true, .. }));
    }

    #[test]
    fn test_recovery_emitted_once_and_state_dropped() {
        let mut limiter = AlertLimiter::new(None);
        let issues = vec![issue(30, true)];

        limiter.process(&issues, at(0));
        assert_eq!(limiter.active(), 1);

        let events = limiter.process(&[], at(1));
        assert_eq!(events.len(), 1);
        assert!(events[0].is_recovery());
        assert_eq!(limiter.active(), 0);

        // Nothing left to recover.
        assert!(limiter.process(&[], at(2)).is_empty());

        // Reappearance is a fresh first sighting.
        let events = limiter.process(&issues, at(3));
        assert!(matches!(
            events[0],
            AlertEvent::Alert { repeat: false, .. }
        ));
    }

    #[test]
    fn test_silent_recovery_when_not_configured() {
        let mut limiter = AlertLimiter::new(None);
        limiter.process(&[issue(30, false)], at(0));

        let events = limiter.process(&[], at(1));
        assert!(events.is_empty());
        assert_eq!(limiter.active(), 0);
    }

    #[test]
    fn test_alerts_precede_recoveries() {
        let mut limiter = AlertLimiter::new(None);
        let mut other = issue(30, true);
        other.base_asset = "SOL".to_string();

        limiter.process(&[other], at(0));
        let events = limiter.process(&[issue(30, true)], at(1));

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AlertEvent::Alert { .. }));
        assert!(events[1].is_recovery());
        assert_eq!(events[1].issue().base_asset, "SOL");
    }
}
