//! The exchange gateway trait.
//!
//! Trait-based abstraction over the exchange REST surface. This allows:
//! - Dependency injection for testing
//! - Separation of the engine from transport/signing concerns
//! - Paper-mode execution behind the same contract

use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use wavex_core::{
    MarginCoin, MarginMode, MarketType, OrderSide, OrderType, PlanType, Price, ProductType, Size,
    Symbol,
};

use crate::error::GatewayResult;
use crate::types::{
    BillRecord, BusinessType, LeverageMode, ModifyTpslParams, OrderParams, PlacedOrder,
    PlanOrder, PlanOrderParams, Position,
};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Contract the position/risk engine consumes the exchange through.
///
/// Implementations must be internally thread-safe: a single instance is
/// shared by the risk manager and the position manager, and possibly by
/// several trading sessions.
///
/// All network-reaching methods return futures; the engine awaits them
/// sequentially within one signal cycle. Retry/backoff is the
/// implementation's responsibility, never the caller's.
pub trait ExchangeGateway: Send + Sync {
    /// Available balance in the quote/margin currency.
    fn get_available_balance(
        &self,
        symbol: Symbol,
        market_type: MarketType,
        product_type: ProductType,
        margin_coin: MarginCoin,
    ) -> BoxFuture<'_, GatewayResult<Decimal>>;

    /// Last traded price.
    fn get_ticker_price(
        &self,
        symbol: Symbol,
        market_type: MarketType,
        product_type: ProductType,
    ) -> BoxFuture<'_, GatewayResult<Price>>;

    /// Order quantity for a quote-currency amount.
    ///
    /// Subtracts commission from the effective amount and rounds down to
    /// the symbol's size precision: `(effective - commission) / price`.
    fn calculate_quantity(
        &self,
        required_amount: Decimal,
        symbol: Symbol,
        market_type: MarketType,
        side: OrderSide,
        order_type: OrderType,
        leverage: Decimal,
        product_type: ProductType,
    ) -> BoxFuture<'_, GatewayResult<Size>>;

    /// Commission rate for a market/order-type combination.
    fn get_commission_rate(
        &self,
        market_type: MarketType,
        order_type: OrderType,
    ) -> BoxFuture<'_, GatewayResult<Decimal>>;

    /// Decimal places allowed in prices for this symbol.
    fn price_precision(&self, symbol: &Symbol) -> u32;

    /// Decimal places allowed in sizes for this symbol.
    fn size_precision(&self, symbol: &Symbol) -> u32;

    /// Submit a plain order.
    fn place_order(
        &self,
        params: OrderParams,
        product_type: ProductType,
        margin_coin: MarginCoin,
        margin_mode: MarginMode,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>>;

    /// Submit a conditional order (trailing stop, pending entry).
    fn place_plan_order(
        &self,
        params: PlanOrderParams,
        market_type: MarketType,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>>;

    /// Submit a TP/SL order.
    fn place_tpsl_order(
        &self,
        params: PlanOrderParams,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>>;

    /// Modify an existing TP/SL order in place.
    fn modify_tpsl_order(
        &self,
        params: ModifyTpslParams,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>>;

    /// Open positions; all symbols when `symbol` is None.
    fn get_positions(
        &self,
        symbol: Option<Symbol>,
        product_type: ProductType,
        margin_coin: MarginCoin,
    ) -> BoxFuture<'_, GatewayResult<Vec<Position>>>;

    /// Active conditional orders; all plan types when `plan_type` is None.
    fn get_active_plan_orders(
        &self,
        symbol: Symbol,
        product_type: ProductType,
        plan_type: Option<PlanType>,
    ) -> BoxFuture<'_, GatewayResult<Vec<PlanOrder>>>;

    /// Apply a leverage setting.
    fn set_leverage(
        &self,
        symbol: Symbol,
        product_type: ProductType,
        margin_coin: MarginCoin,
        mode: LeverageMode,
    ) -> BoxFuture<'_, GatewayResult<()>>;

    /// Billing records for a business category within a time window.
    fn get_account_bills(
        &self,
        product_type: ProductType,
        business_type: BusinessType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> BoxFuture<'_, GatewayResult<Vec<BillRecord>>>;
}

/// Arc wrapper for gateway trait objects.
pub type DynGateway = Arc<dyn ExchangeGateway>;
