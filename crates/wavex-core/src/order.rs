//! Order-related types and identifiers.
//!
//! Provides order side, hold side, plan type, and client order ID types
//! for the trading system.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1 for buy, -1 for sell (for position calculations).
    pub fn sign(&self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Position direction on the exchange: long or short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldSide {
    Long,
    Short,
}

impl HoldSide {
    /// The order side that closes a position held on this side.
    pub fn close_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Sell,
            Self::Short => OrderSide::Buy,
        }
    }

    /// The order side that opens or adds to a position on this side.
    pub fn open_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }
}

impl fmt::Display for HoldSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Market => write!(f, "market"),
        }
    }
}

/// Whether an order opens or closes position exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionAction {
    #[default]
    Open,
    Close,
}

impl fmt::Display for PositionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// Trigger price source for plan orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    FillPrice,
    #[default]
    MarkPrice,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FillPrice => write!(f, "fill_price"),
            Self::MarkPrice => write!(f, "mark_price"),
        }
    }
}

/// Derivative (plan) order variant.
///
/// Variant selection rule: a plan with an explicit size is a partial/fixed
/// plan (`LossPlan`/`ProfitPlan`); a plan with no size applies to the whole
/// position (`PosLoss`/`PosProfit`); trailing stops are always `MovingPlan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    /// Partial stop-loss with an explicit size.
    LossPlan,
    /// Partial take-profit with an explicit size.
    ProfitPlan,
    /// Positional stop-loss covering the whole position.
    PosLoss,
    /// Positional take-profit covering the whole position.
    PosProfit,
    /// Trailing stop; requires size and range rate.
    MovingPlan,
    /// Pending entry order triggered at a price.
    NormalPlan,
}

impl PlanType {
    /// True for the stop-loss family (partial or positional).
    pub fn is_stop_loss(&self) -> bool {
        matches!(self, Self::LossPlan | Self::PosLoss)
    }

    /// True for the take-profit family (partial or positional).
    pub fn is_take_profit(&self) -> bool {
        matches!(self, Self::ProfitPlan | Self::PosProfit)
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LossPlan => write!(f, "loss_plan"),
            Self::ProfitPlan => write!(f, "profit_plan"),
            Self::PosLoss => write!(f, "pos_loss"),
            Self::PosProfit => write!(f, "pos_profit"),
            Self::MovingPlan => write!(f, "moving_plan"),
            Self::NormalPlan => write!(f, "normal_plan"),
        }
    }
}

/// Client order ID for idempotency.
///
/// Every order gets a unique cloid so retries at the transport layer can
/// never double-submit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `wvx_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("wvx_{ts}_{uuid_short}"))
    }

    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for ClientOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_hold_side_close_side() {
        assert_eq!(HoldSide::Long.close_side(), OrderSide::Sell);
        assert_eq!(HoldSide::Short.close_side(), OrderSide::Buy);
    }

    #[test]
    fn test_hold_side_open_side() {
        assert_eq!(HoldSide::Long.open_side(), OrderSide::Buy);
        assert_eq!(HoldSide::Short.open_side(), OrderSide::Sell);
    }

    #[test]
    fn test_plan_type_families() {
        assert!(PlanType::LossPlan.is_stop_loss());
        assert!(PlanType::PosLoss.is_stop_loss());
        assert!(PlanType::ProfitPlan.is_take_profit());
        assert!(PlanType::PosProfit.is_take_profit());
        assert!(!PlanType::MovingPlan.is_stop_loss());
        assert!(!PlanType::MovingPlan.is_take_profit());
    }

    #[test]
    fn test_plan_type_wire_names() {
        assert_eq!(PlanType::PosLoss.to_string(), "pos_loss");
        assert_eq!(PlanType::MovingPlan.to_string(), "moving_plan");
    }

    #[test]
    fn test_client_order_id_unique() {
        let id1 = ClientOrderId::new();
        let id2 = ClientOrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_client_order_id_format() {
        let id = ClientOrderId::new();
        assert!(id.as_str().starts_with("wvx_"));
    }
}
