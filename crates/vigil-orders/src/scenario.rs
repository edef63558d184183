//! Emission scenarios.
//!
//! The closed set of outcomes the aggregator can announce. Each scenario
//! fixes the card state label, the price source for display, and whether
//! cumulative aggregates are attached.

use std::fmt;

/// Price preference when rendering the display price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    /// Prefer the fill average, falling back through last/order/stop price.
    Average,
    /// Prefer the placed order price, falling back through stop/average/last.
    Order,
}

/// One announced order outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    SltpNew,
    SltpPartialTimeout,
    SltpPartialCompleted,
    SltpFilled,
    SltpPartialCanceled,
    SltpCanceled,
    GeneralTimeout,
    GeneralAggregated,
    GeneralSingle,
    GeneralPartialCanceled,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SltpNew => "SLTP_NEW",
            Self::SltpPartialTimeout => "SLTP_PARTIAL_TIMEOUT",
            Self::SltpPartialCompleted => "SLTP_PARTIAL_COMPLETED",
            Self::SltpFilled => "SLTP_FILLED",
            Self::SltpPartialCanceled => "SLTP_PARTIAL_CANCELED",
            Self::SltpCanceled => "SLTP_CANCELED",
            Self::GeneralTimeout => "GENERAL_TIMEOUT",
            Self::GeneralAggregated => "GENERAL_AGGREGATED",
            Self::GeneralSingle => "GENERAL_SINGLE",
            Self::GeneralPartialCanceled => "GENERAL_PARTIAL_CANCELED",
        }
    }

    /// State label shown on the card.
    pub fn state_label(&self) -> &'static str {
        match self {
            Self::SltpNew => "创建",
            Self::SltpPartialTimeout | Self::GeneralTimeout => "部分成交",
            Self::SltpPartialCompleted
            | Self::SltpFilled
            | Self::GeneralAggregated
            | Self::GeneralSingle => "成交",
            Self::SltpPartialCanceled | Self::SltpCanceled | Self::GeneralPartialCanceled => {
                "取消"
            }
        }
    }

    /// Which price the card leads with.
    pub fn price_source(&self) -> PriceSource {
        match self {
            Self::SltpNew => PriceSource::Order,
            _ => PriceSource::Average,
        }
    }

    /// Whether cumulative aggregates (quote, ratio, PnL) are attached.
    pub fn include_cumulative(&self) -> bool {
        !matches!(self, Self::SltpNew | Self::SltpCanceled)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(Scenario::SltpNew.state_label(), "创建");
        assert_eq!(Scenario::GeneralTimeout.state_label(), "部分成交");
        assert_eq!(Scenario::GeneralSingle.state_label(), "成交");
        assert_eq!(Scenario::SltpPartialCanceled.state_label(), "取消");
    }

    #[test]
    fn test_cumulative_attachment() {
        assert!(!Scenario::SltpNew.include_cumulative());
        assert!(!Scenario::SltpCanceled.include_cumulative());
        assert!(Scenario::SltpPartialCanceled.include_cumulative());
        assert!(Scenario::GeneralAggregated.include_cumulative());
    }

    #[test]
    fn test_price_source() {
        assert_eq!(Scenario::SltpNew.price_source(), PriceSource::Order);
        assert_eq!(Scenario::GeneralSingle.price_source(), PriceSource::Average);
    }
}
