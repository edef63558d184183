//! Client-order-id classification.
//!
//! The account's orders encode intent in the client order id prefix:
//! `TP`/`SL` ladders, `FT` follow-trade stops and `TW_<frame>` time-window
//! stops. Everything else is a plain order.

use std::fmt;

/// Order kind derived from the client-order-id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKind {
    /// Take-profit ladder (`TP`, `TP1`, `TP2`, ...).
    Tp,
    /// Hard stop-loss ladder (`SL`, `SL1`, ...).
    Sl,
    /// Follow-trade trailing stop (`FT...`).
    Ft,
    /// Time-window stop (`TW_<frame>...`).
    Tw,
    /// No recognized prefix.
    Other,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tp => "TP",
            Self::Sl => "SL",
            Self::Ft => "FT",
            Self::Tw => "TW",
            Self::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// Classification result for one client order id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCategory {
    pub kind: OrderKind,
    /// Ladder level parsed from trailing digits (`TP2` -> 2).
    pub level: Option<u32>,
    /// Time frame parsed from `TW_<frame>`.
    pub time_frame: Option<String>,
}

impl OrderCategory {
    /// Source label shown on notification cards.
    pub fn source(&self) -> &'static str {
        match self.kind {
            OrderKind::Tp => "止盈",
            OrderKind::Sl | OrderKind::Tw => "止损",
            OrderKind::Ft => "追踪止损",
            OrderKind::Other => "其他",
        }
    }

    /// Card title suffix; the full title is `<symbol>-<suffix>`.
    pub fn title_suffix(&self) -> String {
        match (self.kind, self.level, self.time_frame.as_deref()) {
            (OrderKind::Tp, Some(level), _) => format!("移动止损第{level}档"),
            (OrderKind::Tp, None, _) => "止盈".to_string(),
            (OrderKind::Sl, Some(level), _) => format!("硬止损第{level}档"),
            (OrderKind::Sl, None, _) => "硬止损单".to_string(),
            (OrderKind::Ft, _, _) => "跟踪交易止损".to_string(),
            (OrderKind::Tw, _, Some(frame)) => format!("{frame} 时间周期止损单"),
            (OrderKind::Tw, _, None) => "时间周期止损单".to_string(),
            (OrderKind::Other, _, _) => "其他".to_string(),
        }
    }

    /// Stop-like orders go through the stop scenario table.
    pub fn is_stop_like(&self) -> bool {
        self.kind != OrderKind::Other
    }

    pub fn other() -> Self {
        Self {
            kind: OrderKind::Other,
            level: None,
            time_frame: None,
        }
    }
}

/// Classify a client order id by prefix, highest priority first.
pub fn classify(client_order_id: &str) -> OrderCategory {
    let id = client_order_id.trim().to_uppercase();

    if let Some(rest) = id.strip_prefix("TW_") {
        let frame: String = rest
            .chars()
            .take_while(|c| *c != '_' && *c != '-')
            .collect();
        return OrderCategory {
            kind: OrderKind::Tw,
            level: None,
            time_frame: (!frame.is_empty()).then_some(frame),
        };
    }

    if let Some(rest) = id.strip_prefix("TP") {
        return OrderCategory {
            kind: OrderKind::Tp,
            level: leading_digits(rest),
            time_frame: None,
        };
    }

    if let Some(rest) = id.strip_prefix("SL") {
        return OrderCategory {
            kind: OrderKind::Sl,
            level: leading_digits(rest),
            time_frame: None,
        };
    }

    if id.starts_with("FT") {
        return OrderCategory {
            kind: OrderKind::Ft,
            level: None,
            time_frame: None,
        };
    }

    OrderCategory::other()
}

fn leading_digits(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tp_with_level() {
        let cat = classify("TP2-btc-001");
        assert_eq!(cat.kind, OrderKind::Tp);
        assert_eq!(cat.level, Some(2));
        assert_eq!(cat.title_suffix(), "移动止损第2档");
        assert_eq!(cat.source(), "止盈");
    }

    #[test]
    fn test_lone_tp_is_umbrella() {
        let cat = classify("TP-moving");
        assert_eq!(cat.kind, OrderKind::Tp);
        assert_eq!(cat.level, None);
        assert_eq!(cat.title_suffix(), "止盈");
    }

    #[test]
    fn test_sl_variants() {
        assert_eq!(classify("SL3").title_suffix(), "硬止损第3档");
        assert_eq!(classify("sl").title_suffix(), "硬止损单");
        assert_eq!(classify("SL").source(), "止损");
    }

    #[test]
    fn test_tw_time_frame() {
        let cat = classify("TW_4H_20240101");
        assert_eq!(cat.kind, OrderKind::Tw);
        assert_eq!(cat.time_frame.as_deref(), Some("4H"));
        assert_eq!(cat.title_suffix(), "4H 时间周期止损单");
        assert_eq!(cat.source(), "止损");
    }

    #[test]
    fn test_tw_beats_tp_priority() {
        // TW_ is tested before TP even though the id contains "TP" later.
        let cat = classify("TW_1D_TP");
        assert_eq!(cat.kind, OrderKind::Tw);
    }

    #[test]
    fn test_ft_and_other() {
        assert_eq!(classify("FT-trail").kind, OrderKind::Ft);
        assert_eq!(classify("FT-trail").source(), "追踪止损");
        assert_eq!(classify("web_abc123").kind, OrderKind::Other);
        assert_eq!(classify("web_abc123").title_suffix(), "其他");
        assert!(!classify("ORD-1").is_stop_like());
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        assert_eq!(classify("  tp1  ").level, Some(1));
        assert_eq!(classify("tw_15m").time_frame.as_deref(), Some("15M"));
    }
}
