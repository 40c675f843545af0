//! Mock exchange gateway for testing.
//!
//! Scripted responses plus full call recording, so tests can assert both
//! what the engine decided and what it submitted.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;

use wavex_core::{
    MarginCoin, MarginMode, MarketType, OrderSide, OrderType, PlanType, Price, ProductType, Size,
    Symbol,
};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, ExchangeGateway};
use crate::types::{
    BillRecord, BusinessType, LeverageMode, ModifyTpslParams, OrderParams, PlacedOrder,
    PlanOrder, PlanOrderParams, Position,
};

/// Mock gateway with scripted state and recorded calls.
pub struct MockExchangeGateway {
    balance: Mutex<Decimal>,
    ticker: Mutex<Price>,
    commission_rate: Mutex<Decimal>,
    /// Scripted quantity; when None it is derived from balance math.
    quantity: Mutex<Option<Size>>,
    price_precision: Mutex<u32>,
    size_precision: Mutex<u32>,
    positions: Mutex<Vec<Position>>,
    plan_orders: Mutex<Vec<PlanOrder>>,
    bills: Mutex<Vec<BillRecord>>,

    fail_balance: Mutex<Option<String>>,
    fail_place_order: Mutex<Option<String>>,
    fail_tpsl: Mutex<Option<String>>,
    fail_bills: Mutex<Option<String>>,

    placed_orders: Mutex<Vec<OrderParams>>,
    plan_orders_placed: Mutex<Vec<(PlanOrderParams, MarketType)>>,
    tpsl_orders_placed: Mutex<Vec<PlanOrderParams>>,
    modified_tpsl: Mutex<Vec<ModifyTpslParams>>,
    leverage_calls: Mutex<Vec<(Symbol, LeverageMode)>>,

    next_order_id: AtomicU64,
}

impl Default for MockExchangeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchangeGateway {
    pub fn new() -> Self {
        Self {
            balance: Mutex::new(Decimal::from(1000)),
            ticker: Mutex::new(Price::new(Decimal::from(50000))),
            commission_rate: Mutex::new(Decimal::new(6, 4)), // 0.0006
            quantity: Mutex::new(None),
            price_precision: Mutex::new(2),
            size_precision: Mutex::new(4),
            positions: Mutex::new(Vec::new()),
            plan_orders: Mutex::new(Vec::new()),
            bills: Mutex::new(Vec::new()),
            fail_balance: Mutex::new(None),
            fail_place_order: Mutex::new(None),
            fail_tpsl: Mutex::new(None),
            fail_bills: Mutex::new(None),
            placed_orders: Mutex::new(Vec::new()),
            plan_orders_placed: Mutex::new(Vec::new()),
            tpsl_orders_placed: Mutex::new(Vec::new()),
            modified_tpsl: Mutex::new(Vec::new()),
            leverage_calls: Mutex::new(Vec::new()),
            next_order_id: AtomicU64::new(1),
        }
    }

    // --- scripting ---

    pub fn set_balance(&self, balance: Decimal) {
        *self.balance.lock() = balance;
    }

    pub fn set_ticker(&self, price: Price) {
        *self.ticker.lock() = price;
    }

    pub fn set_commission_rate(&self, rate: Decimal) {
        *self.commission_rate.lock() = rate;
    }

    pub fn set_quantity(&self, quantity: Size) {
        *self.quantity.lock() = Some(quantity);
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        *self.positions.lock() = positions;
    }

    pub fn set_plan_orders(&self, orders: Vec<PlanOrder>) {
        *self.plan_orders.lock() = orders;
    }

    pub fn set_bills(&self, bills: Vec<BillRecord>) {
        *self.bills.lock() = bills;
    }

    pub fn fail_balance_with(&self, msg: impl Into<String>) {
        *self.fail_balance.lock() = Some(msg.into());
    }

    pub fn fail_place_order_with(&self, msg: impl Into<String>) {
        *self.fail_place_order.lock() = Some(msg.into());
    }

    pub fn fail_tpsl_with(&self, msg: impl Into<String>) {
        *self.fail_tpsl.lock() = Some(msg.into());
    }

    pub fn fail_bills_with(&self, msg: impl Into<String>) {
        *self.fail_bills.lock() = Some(msg.into());
    }

    // --- recorded calls ---

    pub fn placed_orders(&self) -> Vec<OrderParams> {
        self.placed_orders.lock().clone()
    }

    pub fn plan_orders_placed(&self) -> Vec<(PlanOrderParams, MarketType)> {
        self.plan_orders_placed.lock().clone()
    }

    pub fn tpsl_orders_placed(&self) -> Vec<PlanOrderParams> {
        self.tpsl_orders_placed.lock().clone()
    }

    pub fn modified_tpsl(&self) -> Vec<ModifyTpslParams> {
        self.modified_tpsl.lock().clone()
    }

    pub fn leverage_calls(&self) -> Vec<(Symbol, LeverageMode)> {
        self.leverage_calls.lock().clone()
    }

    fn next_id(&self) -> String {
        format!("mock-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst))
    }

    fn ack(&self, client_oid: Option<String>) -> PlacedOrder {
        let order_id = self.next_id();
        PlacedOrder {
            raw: json!({ "orderId": order_id, "clientOid": client_oid }),
            order_id,
            client_oid,
        }
    }
}

impl ExchangeGateway for MockExchangeGateway {
    fn get_available_balance(
        &self,
        _symbol: Symbol,
        _market_type: MarketType,
        _product_type: ProductType,
        _margin_coin: MarginCoin,
    ) -> BoxFuture<'_, GatewayResult<Decimal>> {
        Box::pin(async move {
            if let Some(msg) = self.fail_balance.lock().clone() {
                return Err(GatewayError::Transport(msg));
            }
            Ok(*self.balance.lock())
        })
    }

    fn get_ticker_price(
        &self,
        _symbol: Symbol,
        _market_type: MarketType,
        _product_type: ProductType,
    ) -> BoxFuture<'_, GatewayResult<Price>> {
        Box::pin(async move { Ok(*self.ticker.lock()) })
    }

    fn calculate_quantity(
        &self,
        required_amount: Decimal,
        symbol: Symbol,
        _market_type: MarketType,
        _side: OrderSide,
        _order_type: OrderType,
        leverage: Decimal,
        _product_type: ProductType,
    ) -> BoxFuture<'_, GatewayResult<Size>> {
        Box::pin(async move {
            if let Some(q) = *self.quantity.lock() {
                return Ok(q);
            }
            let leverage = if leverage > Decimal::ZERO {
                leverage
            } else {
                Decimal::ONE
            };
            let effective = required_amount * leverage;
            let commission = effective * *self.commission_rate.lock();
            let price = *self.ticker.lock();
            let quantity = Size::new((effective - commission) / price.inner());
            Ok(quantity.round_dp(self.size_precision(&symbol)))
        })
    }

    fn get_commission_rate(
        &self,
        _market_type: MarketType,
        _order_type: OrderType,
    ) -> BoxFuture<'_, GatewayResult<Decimal>> {
        Box::pin(async move { Ok(*self.commission_rate.lock()) })
    }

    fn price_precision(&self, _symbol: &Symbol) -> u32 {
        *self.price_precision.lock()
    }

    fn size_precision(&self, _symbol: &Symbol) -> u32 {
        *self.size_precision.lock()
    }

    fn place_order(
        &self,
        params: OrderParams,
        _product_type: ProductType,
        _margin_coin: MarginCoin,
        _margin_mode: MarginMode,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>> {
        Box::pin(async move {
            if let Some(msg) = self.fail_place_order.lock().clone() {
                return Err(GatewayError::Transport(msg));
            }
            let client_oid = Some(params.client_oid.as_str().to_string());
            self.placed_orders.lock().push(params);
            Ok(self.ack(client_oid))
        })
    }

    fn place_plan_order(
        &self,
        params: PlanOrderParams,
        market_type: MarketType,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>> {
        Box::pin(async move {
            if let Some(msg) = self.fail_tpsl.lock().clone() {
                return Err(GatewayError::Transport(msg));
            }
            let client_oid = Some(params.client_oid.as_str().to_string());
            self.plan_orders_placed.lock().push((params, market_type));
            Ok(self.ack(client_oid))
        })
    }

    fn place_tpsl_order(
        &self,
        params: PlanOrderParams,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>> {
        Box::pin(async move {
            if let Some(msg) = self.fail_tpsl.lock().clone() {
                return Err(GatewayError::Transport(msg));
            }
            let client_oid = Some(params.client_oid.as_str().to_string());
            self.tpsl_orders_placed.lock().push(params);
            Ok(self.ack(client_oid))
        })
    }

    fn modify_tpsl_order(
        &self,
        params: ModifyTpslParams,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>> {
        Box::pin(async move {
            if let Some(msg) = self.fail_tpsl.lock().clone() {
                return Err(GatewayError::Transport(msg));
            }
            let order_id = params
                .order_id
                .clone()
                .unwrap_or_else(|| self.next_id());
            self.modified_tpsl.lock().push(params);
            Ok(PlacedOrder {
                raw: json!({ "orderId": order_id }),
                order_id,
                client_oid: None,
            })
        })
    }

    fn get_positions(
        &self,
        symbol: Option<Symbol>,
        _product_type: ProductType,
        _margin_coin: MarginCoin,
    ) -> BoxFuture<'_, GatewayResult<Vec<Position>>> {
        Box::pin(async move {
            let positions = self.positions.lock().clone();
            Ok(match symbol {
                Some(symbol) => positions
                    .into_iter()
                    .filter(|p| p.symbol == symbol)
                    .collect(),
                None => positions,
            })
        })
    }

    fn get_active_plan_orders(
        &self,
        symbol: Symbol,
        _product_type: ProductType,
        plan_type: Option<PlanType>,
    ) -> BoxFuture<'_, GatewayResult<Vec<PlanOrder>>> {
        Box::pin(async move {
            Ok(self
                .plan_orders
                .lock()
                .iter()
                .filter(|o| o.symbol == symbol)
                .filter(|o| plan_type.map_or(true, |pt| o.plan_type == pt))
                .cloned()
                .collect())
        })
    }

    fn set_leverage(
        &self,
        symbol: Symbol,
        _product_type: ProductType,
        _margin_coin: MarginCoin,
        mode: LeverageMode,
    ) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            self.leverage_calls.lock().push((symbol, mode));
            Ok(())
        })
    }

    fn get_account_bills(
        &self,
        _product_type: ProductType,
        business_type: BusinessType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> BoxFuture<'_, GatewayResult<Vec<BillRecord>>> {
        Box::pin(async move {
            if let Some(msg) = self.fail_bills.lock().clone() {
                return Err(GatewayError::Transport(msg));
            }
            Ok(self
                .bills
                .lock()
                .iter()
                .filter(|b| b.business_type == business_type)
                .filter(|b| b.ts >= start && b.ts <= end)
                .take(limit as usize)
                .cloned()
                .collect())
        })
    }
}
