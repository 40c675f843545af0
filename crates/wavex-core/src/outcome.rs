//! Tagged outcomes for position-opening attempts.
//!
//! Business-rule skips are data, not exceptions: callers match on the
//! outcome instead of distinguishing error types. Infrastructure failures
//! still travel as errors alongside this type.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Price, Size};
use crate::market::{MarketType, Symbol};
use crate::order::{OrderSide, OrderType};

/// Reason an open-position attempt was skipped without placing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Daily loss limit reached; trading is paused until UTC midnight.
    TradingDisallowed,
    /// Calculated quantity rounded down to zero.
    ZeroQuantity,
    /// Risk manager rejected the position (balance or size limit).
    RiskRejected,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TradingDisallowed => write!(f, "trading_disallowed"),
            Self::ZeroQuantity => write!(f, "zero_quantity"),
            Self::RiskRejected => write!(f, "risk_rejected"),
        }
    }
}

/// A successfully placed opening order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange-assigned order ID.
    pub order_id: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Size,
    /// `required_amount / quantity`; zero when quantity is zero.
    pub estimated_entry_price: Price,
    pub order_type: OrderType,
    pub market_type: MarketType,
    /// Raw exchange response, kept for diagnostics.
    pub raw_response: serde_json::Value,
}

impl OrderResult {
    /// Estimated entry price from amount and quantity.
    ///
    /// Zero quantity yields a zero price rather than a division error.
    pub fn estimate_entry_price(required_amount: Decimal, quantity: Size) -> Price {
        if quantity.is_zero() {
            Price::ZERO
        } else {
            Price::new(required_amount / quantity.inner())
        }
    }
}

/// Result of an open-position attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpenOutcome {
    /// Order placed on the exchange.
    Placed(OrderResult),
    /// No order placed; the reason says why.
    Skipped(SkipReason),
}

impl OpenOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed(_))
    }

    /// The placed order, if any.
    pub fn order(&self) -> Option<&OrderResult> {
        match self {
            Self::Placed(order) => Some(order),
            Self::Skipped(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_estimate_entry_price() {
        let price = OrderResult::estimate_entry_price(dec!(1000), Size::new(dec!(0.02)));
        assert_eq!(price, Price::new(dec!(50000)));
    }

    #[test]
    fn test_estimate_entry_price_zero_quantity() {
        let price = OrderResult::estimate_entry_price(dec!(1000), Size::ZERO);
        assert_eq!(price, Price::ZERO);
    }

    #[test]
    fn test_outcome_accessors() {
        let skipped = OpenOutcome::Skipped(SkipReason::ZeroQuantity);
        assert!(!skipped.is_placed());
        assert!(skipped.order().is_none());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::TradingDisallowed.to_string(), "trading_disallowed");
        assert_eq!(SkipReason::ZeroQuantity.to_string(), "zero_quantity");
        assert_eq!(SkipReason::RiskRejected.to_string(), "risk_rejected");
    }
}
