//! In-memory paper-trading gateway.
//!
//! Fills orders instantly at the last pushed price and keeps position,
//! balance, and bill accounting, so the whole engine can run end-to-end
//! without a live exchange. Stop-loss and take-profit plan orders trigger
//! against pushed prices; trailing stops are held but their trailing
//! dynamics are not simulated.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info};

use wavex_core::{
    HoldSide, MarginCoin, MarginMode, MarketType, OrderSide, OrderType, PlanType, PositionAction,
    Price, ProductType, Size, Symbol,
};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, ExchangeGateway};
use crate::types::{
    BillRecord, BusinessType, LeverageMode, ModifyTpslParams, OrderParams, PlacedOrder,
    PlanOrder, PlanOrderParams, Position,
};

#[derive(Debug)]
struct PaperState {
    balance: Decimal,
    last_price: Price,
    positions: HashMap<(Symbol, HoldSide), Position>,
    plan_orders: Vec<PlanOrder>,
    leverage: HashMap<Symbol, Decimal>,
    bills: Vec<BillRecord>,
    next_order_id: u64,
}

/// Paper gateway configuration.
#[derive(Debug, Clone)]
pub struct PaperConfig {
    pub starting_balance: Decimal,
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub price_precision: u32,
    pub size_precision: u32,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_balance: Decimal::from(1000),
            maker_fee: Decimal::new(2, 4),  // 0.02%
            taker_fee: Decimal::new(6, 4),  // 0.06%
            price_precision: 2,
            size_precision: 4,
        }
    }
}

/// In-memory exchange simulator behind the [`ExchangeGateway`] contract.
pub struct PaperGateway {
    config: PaperConfig,
    state: Mutex<PaperState>,
}

impl PaperGateway {
    pub fn new(config: PaperConfig, initial_price: Price) -> Self {
        Self {
            state: Mutex::new(PaperState {
                balance: config.starting_balance,
                last_price: initial_price,
                positions: HashMap::new(),
                plan_orders: Vec::new(),
                leverage: HashMap::new(),
                bills: Vec::new(),
                next_order_id: 1,
            }),
            config,
        }
    }

    /// Feed a new market price; triggers any crossed TP/SL plan orders.
    pub fn push_price(&self, price: Price) {
        let mut state = self.state.lock();
        state.last_price = price;

        // Refresh unrealized PnL.
        for position in state.positions.values_mut() {
            let diff = match position.hold_side {
                HoldSide::Long => price.inner() - position.entry_price.inner(),
                HoldSide::Short => position.entry_price.inner() - price.inner(),
            };
            position.unrealized_pnl = diff * position.size.inner();
        }

        // Fire crossed TP/SL triggers. Trailing stops are not simulated.
        let triggered: Vec<PlanOrder> = state
            .plan_orders
            .iter()
            .filter(|o| o.plan_type != PlanType::MovingPlan && Self::is_triggered(o, price))
            .cloned()
            .collect();
        for order in triggered {
            state.plan_orders.retain(|o| o.order_id != order.order_id);
            Self::execute_close(
                &mut state,
                &order.symbol,
                order.hold_side,
                order.size,
                order.trigger_price,
                self.config.taker_fee,
            );
            info!(
                symbol = %order.symbol,
                plan_type = %order.plan_type,
                trigger = %order.trigger_price,
                "Paper plan order triggered"
            );
        }
    }

    fn is_triggered(order: &PlanOrder, price: Price) -> bool {
        match (order.plan_type.is_stop_loss(), order.hold_side) {
            // Long SL fires when price drops to the trigger; short SL when it rises.
            (true, HoldSide::Long) => price <= order.trigger_price,
            (true, HoldSide::Short) => price >= order.trigger_price,
            // TP is the mirror image.
            (false, HoldSide::Long) => price >= order.trigger_price,
            (false, HoldSide::Short) => price <= order.trigger_price,
        }
    }

    /// Close (part of) a position at `price`, realizing PnL into balance.
    fn execute_close(
        state: &mut PaperState,
        symbol: &Symbol,
        hold_side: HoldSide,
        size: Option<Size>,
        price: Price,
        fee_rate: Decimal,
    ) {
        let key = (symbol.clone(), hold_side);
        let (position_size, entry_price, margin_size) = match state.positions.get(&key) {
            Some(position) => (position.size.abs(), position.entry_price, position.margin_size),
            None => return,
        };
        let close_size = size.map_or(position_size, |s| s.abs()).min(position_size);
        if close_size.is_zero() {
            return;
        }

        let diff = match hold_side {
            HoldSide::Long => price.inner() - entry_price.inner(),
            HoldSide::Short => entry_price.inner() - price.inner(),
        };
        let pnl = diff * close_size.inner();
        let fraction = close_size.inner() / position_size.inner();
        let margin_returned = margin_size * fraction;
        let fee = close_size.inner() * price.inner() * fee_rate;

        let remaining = position_size - close_size;
        if remaining.is_zero() {
            state.positions.remove(&key);
            // Whole position gone; its positional plans die with it.
            state
                .plan_orders
                .retain(|o| !(o.symbol == *symbol && o.hold_side == hold_side && o.size.is_none()));
        } else if let Some(position) = state.positions.get_mut(&key) {
            position.size = remaining;
            position.margin_size -= margin_returned;
        }

        state.balance += margin_returned + pnl - fee;
        state.bills.push(BillRecord {
            business_type: match hold_side {
                HoldSide::Long => BusinessType::CloseLong,
                HoldSide::Short => BusinessType::CloseShort,
            },
            amount: pnl - fee,
            ts: Utc::now(),
        });
    }

    fn next_id(state: &mut PaperState) -> String {
        let id = format!("paper-{}", state.next_order_id);
        state.next_order_id += 1;
        id
    }
}

impl ExchangeGateway for PaperGateway {
    fn get_available_balance(
        &self,
        _symbol: Symbol,
        _market_type: MarketType,
        _product_type: ProductType,
        _margin_coin: MarginCoin,
    ) -> BoxFuture<'_, GatewayResult<Decimal>> {
        Box::pin(async move { Ok(self.state.lock().balance) })
    }

    fn get_ticker_price(
        &self,
        _symbol: Symbol,
        _market_type: MarketType,
        _product_type: ProductType,
    ) -> BoxFuture<'_, GatewayResult<Price>> {
        Box::pin(async move { Ok(self.state.lock().last_price) })
    }

    fn calculate_quantity(
        &self,
        required_amount: Decimal,
        _symbol: Symbol,
        _market_type: MarketType,
        _side: OrderSide,
        order_type: OrderType,
        leverage: Decimal,
        _product_type: ProductType,
    ) -> BoxFuture<'_, GatewayResult<Size>> {
        Box::pin(async move {
            let state = self.state.lock();
            let leverage = if leverage > Decimal::ZERO {
                leverage
            } else {
                Decimal::ONE
            };
            let fee_rate = match order_type {
                OrderType::Limit => self.config.maker_fee,
                OrderType::Market => self.config.taker_fee,
            };
            let effective = required_amount * leverage;
            let commission = effective * fee_rate;
            let quantity = Size::new((effective - commission) / state.last_price.inner());
            Ok(quantity.round_dp(self.config.size_precision))
        })
    }

    fn get_commission_rate(
        &self,
        _market_type: MarketType,
        order_type: OrderType,
    ) -> BoxFuture<'_, GatewayResult<Decimal>> {
        Box::pin(async move {
            Ok(match order_type {
                OrderType::Limit => self.config.maker_fee,
                OrderType::Market => self.config.taker_fee,
            })
        })
    }

    fn price_precision(&self, _symbol: &Symbol) -> u32 {
        self.config.price_precision
    }

    fn size_precision(&self, _symbol: &Symbol) -> u32 {
        self.config.size_precision
    }

    fn place_order(
        &self,
        params: OrderParams,
        _product_type: ProductType,
        _margin_coin: MarginCoin,
        _margin_mode: MarginMode,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            let fill_price = params.price.unwrap_or(state.last_price);
            let fee = params.quantity.inner() * fill_price.inner() * self.config.taker_fee;

            match params.position_action {
                PositionAction::Open => {
                    let hold_side = match params.side {
                        OrderSide::Buy => HoldSide::Long,
                        OrderSide::Sell => HoldSide::Short,
                    };
                    let leverage = state
                        .leverage
                        .get(&params.symbol)
                        .copied()
                        .unwrap_or(Decimal::ONE);
                    let margin =
                        params.quantity.inner() * fill_price.inner() / leverage;
                    if state.balance < margin + fee {
                        return Err(GatewayError::Api {
                            code: "40754".to_string(),
                            message: "insufficient balance".to_string(),
                        });
                    }
                    state.balance -= margin + fee;

                    let key = (params.symbol.clone(), hold_side);
                    match state.positions.entry(key) {
                        std::collections::hash_map::Entry::Occupied(mut entry) => {
                            // Blend entry across the combined size.
                            let position = entry.get_mut();
                            let old_notional =
                                position.size.inner() * position.entry_price.inner();
                            let add_notional = params.quantity.inner() * fill_price.inner();
                            let total = position.size + params.quantity;
                            position.entry_price =
                                Price::new((old_notional + add_notional) / total.inner());
                            position.size = total;
                            position.margin_size += margin;
                        }
                        std::collections::hash_map::Entry::Vacant(entry) => {
                            entry.insert(Position {
                                symbol: params.symbol.clone(),
                                hold_side,
                                size: params.quantity,
                                entry_price: fill_price,
                                unrealized_pnl: Decimal::ZERO,
                                margin_size: margin,
                                leverage,
                            });
                        }
                    }
                    debug!(
                        symbol = %params.symbol,
                        side = %params.side,
                        quantity = %params.quantity,
                        price = %fill_price,
                        "Paper fill: open"
                    );
                }
                PositionAction::Close => {
                    let hold_side = match params.side {
                        OrderSide::Sell => HoldSide::Long,
                        OrderSide::Buy => HoldSide::Short,
                    };
                    Self::execute_close(
                        &mut state,
                        &params.symbol,
                        hold_side,
                        Some(params.quantity),
                        fill_price,
                        self.config.taker_fee,
                    );
                    debug!(
                        symbol = %params.symbol,
                        side = %params.side,
                        quantity = %params.quantity,
                        price = %fill_price,
                        "Paper fill: close"
                    );
                }
            }

            let order_id = Self::next_id(&mut state);
            Ok(PlacedOrder {
                raw: json!({ "orderId": order_id, "fillPrice": fill_price.inner() }),
                order_id,
                client_oid: Some(params.client_oid.as_str().to_string()),
            })
        })
    }

    fn place_plan_order(
        &self,
        params: PlanOrderParams,
        _market_type: MarketType,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>> {
        self.place_tpsl_order(params)
    }

    fn place_tpsl_order(
        &self,
        params: PlanOrderParams,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            let order_id = Self::next_id(&mut state);
            state.plan_orders.push(PlanOrder {
                order_id: order_id.clone(),
                client_oid: Some(params.client_oid.as_str().to_string()),
                symbol: params.symbol,
                plan_type: params.plan_type,
                hold_side: params.hold_side,
                trigger_price: params.trigger_price,
                size: params.size,
            });
            Ok(PlacedOrder {
                raw: json!({ "orderId": order_id }),
                order_id,
                client_oid: None,
            })
        })
    }

    fn modify_tpsl_order(
        &self,
        params: ModifyTpslParams,
    ) -> BoxFuture<'_, GatewayResult<PlacedOrder>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            let order = state
                .plan_orders
                .iter_mut()
                .find(|o| {
                    params.order_id.as_deref() == Some(o.order_id.as_str())
                        || (params.client_oid.is_some()
                            && params.client_oid == o.client_oid)
                })
                .ok_or_else(|| {
                    GatewayError::Api {
                        code: "40786".to_string(),
                        message: "plan order not found".to_string(),
                    }
                })?;
            if let Some(price) = params.new_trigger_price {
                order.trigger_price = price;
            }
            if let Some(size) = params.new_size {
                order.size = Some(size);
            }
            let order_id = order.order_id.clone();
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
            let state = self.state.lock();
            Ok(state
                .positions
                .values()
                .filter(|p| symbol.as_ref().map_or(true, |s| p.symbol == *s))
                .cloned()
                .collect())
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
                .state
                .lock()
                .plan_orders
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
            let leverage = match mode {
                LeverageMode::Uniform(l) => l,
                LeverageMode::SingleSide { leverage, .. } => leverage,
                LeverageMode::Split { long_leverage, .. } => long_leverage,
            };
            self.state.lock().leverage.insert(symbol, leverage);
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
            Ok(self
                .state
                .lock()
                .bills
                .iter()
                .filter(|b| b.business_type == business_type)
                .filter(|b| b.ts >= start && b.ts <= end)
                .take(limit as usize)
                .cloned()
                .collect())
        })
    }
}
