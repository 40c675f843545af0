//! Request and response types for the exchange gateway.
//!
//! These are the logical order shapes the core constructs. Exchange-specific
//! decoration (tradeSide, productType query params, margin fields) is the
//! gateway implementation's concern at submit time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wavex_core::{
    ClientOrderId, HoldSide, MarginCoin, MarketType, OrderSide, OrderType, PlanType,
    PositionAction, Price, ProductType, Size, Symbol, TriggerType,
};

/// Parameters for a plain (market/limit) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Size,
    pub order_type: OrderType,
    pub position_action: PositionAction,
    pub market_type: MarketType,
    /// Limit price; None for market orders.
    pub price: Option<Price>,
    pub client_oid: ClientOrderId,
}

impl OrderParams {
    /// Build logical order parameters.
    ///
    /// This is the single place order shapes are constructed; the gateway
    /// attaches exchange-specific fields when the order is submitted.
    pub fn new(
        symbol: Symbol,
        side: OrderSide,
        quantity: Size,
        order_type: OrderType,
        position_action: PositionAction,
        market_type: MarketType,
    ) -> Self {
        Self {
            symbol,
            side,
            quantity,
            order_type,
            position_action,
            market_type,
            price: None,
            client_oid: ClientOrderId::new(),
        }
    }

    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }
}

/// Parameters for a conditional (plan/trigger) order.
///
/// Covers stop-loss, take-profit, trailing-stop, and pending entries; the
/// `plan_type` discriminates. `size: None` means positional (whole position).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOrderParams {
    pub symbol: Symbol,
    pub product_type: ProductType,
    pub margin_coin: MarginCoin,
    pub plan_type: PlanType,
    pub hold_side: HoldSide,
    pub trigger_price: Price,
    pub trigger_type: TriggerType,
    /// Execution price once triggered; None executes at market.
    pub execute_price: Option<Price>,
    /// None for positional plans; required for partial and trailing plans.
    pub size: Option<Size>,
    /// Trailing distance as a fraction; only for `MovingPlan`.
    pub range_rate: Option<Decimal>,
    pub client_oid: ClientOrderId,
    /// Self-trade-prevention mode, passed through verbatim when set.
    pub stp_mode: Option<String>,
}

/// Parameters for modifying an existing TP/SL order in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyTpslParams {
    pub symbol: Symbol,
    /// Exchange order ID; at least one of `order_id`/`client_oid` required.
    pub order_id: Option<String>,
    pub client_oid: Option<String>,
    pub new_trigger_price: Option<Price>,
    pub new_size: Option<Size>,
    pub new_execute_price: Option<Price>,
    pub new_range_rate: Option<Decimal>,
    pub trigger_type: TriggerType,
}

/// A successfully submitted order, as acknowledged by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: String,
    pub client_oid: Option<String>,
    /// Raw exchange payload, kept for diagnostics.
    pub raw: serde_json::Value,
}

/// An open position as reported by the exchange.
///
/// Always fetched fresh; the core never caches this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub hold_side: HoldSide,
    pub size: Size,
    pub entry_price: Price,
    pub unrealized_pnl: Decimal,
    pub margin_size: Decimal,
    pub leverage: Decimal,
}

impl Position {
    /// True when the position carries exposure.
    pub fn is_open(&self) -> bool {
        !self.size.abs().is_zero()
    }
}

/// An active conditional order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOrder {
    pub order_id: String,
    pub client_oid: Option<String>,
    pub symbol: Symbol,
    pub plan_type: PlanType,
    pub hold_side: HoldSide,
    pub trigger_price: Price,
    pub size: Option<Size>,
}

/// Billing business category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    Funding,
    Fee,
}

impl std::fmt::Display for BusinessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenLong => write!(f, "open_long"),
            Self::OpenShort => write!(f, "open_short"),
            Self::CloseLong => write!(f, "close_long"),
            Self::CloseShort => write!(f, "close_short"),
            Self::Funding => write!(f, "funding"),
            Self::Fee => write!(f, "fee"),
        }
    }
}

/// One account billing record (realized PnL, fees, funding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub business_type: BusinessType,
    /// Signed amount in the margin coin.
    pub amount: Decimal,
    pub ts: DateTime<Utc>,
}

/// Resolved leverage setting, one mode per request.
///
/// The position layer validates that callers pick exactly one mode before
/// this enum is constructed; the gateway just transmits it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LeverageMode {
    /// Same leverage for both directions.
    Uniform(Decimal),
    /// Hedge mode: one direction only.
    SingleSide { hold_side: HoldSide, leverage: Decimal },
    /// Hedge mode: both directions explicitly.
    Split {
        long_leverage: Decimal,
        short_leverage: Decimal,
    },
}
