//! Break-even transition: move the stop-loss to (near) entry once a
//! position is sufficiently profitable.
//!
//! Per (symbol, hold side) the machine has two states: below threshold
//! and armed. Arming happens at most once per open position; re-checking
//! an armed position makes no gateway call. Closing the position clears
//! the state so a fresh position re-arms from scratch.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use wavex_core::{
    ClientOrderId, HoldSide, MarginCoin, Price, ProductType, Symbol, TriggerType,
};
use wavex_gateway::{ExchangeGateway, ModifyTpslParams, PlanOrderParams};

use crate::error::PositionResult;
use crate::manager::PositionManager;

/// Break-even defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenConfig {
    /// Profit fraction that arms the transition.
    #[serde(default = "default_profit_threshold")]
    pub profit_threshold: Decimal,
    /// Offset from entry for the new stop, covering fees and spread.
    #[serde(default = "default_buffer_percent")]
    pub buffer_percent: Decimal,
}

fn default_profit_threshold() -> Decimal {
    Decimal::new(3, 2) // 3%
}

fn default_buffer_percent() -> Decimal {
    Decimal::new(1, 3) // 0.1%
}

impl Default for BreakEvenConfig {
    fn default() -> Self {
        Self {
            profit_threshold: default_profit_threshold(),
            buffer_percent: default_buffer_percent(),
        }
    }
}

/// What happened to one position during a break-even check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakEvenAction {
    /// A new positional stop-loss was created at entry ± buffer.
    Created,
    /// An existing stop-loss was moved to entry ± buffer.
    Modified,
    /// Already armed earlier; nothing submitted.
    AlreadyArmed,
    /// Profit below the threshold; keep monitoring.
    WaitingForProfit,
}

/// Per-position break-even result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakEvenDetail {
    pub symbol: Symbol,
    pub hold_side: HoldSide,
    pub entry_price: Price,
    pub current_price: Price,
    pub profit_percent: Decimal,
    pub action: BreakEvenAction,
    pub new_stop_loss: Option<Price>,
}

/// Aggregate result of an `auto_break_even` sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakEvenReport {
    pub success: bool,
    pub break_even_activated: u32,
    pub waiting_for_profit: u32,
    pub errors: u32,
    pub error_messages: Vec<String>,
    pub details: Vec<BreakEvenDetail>,
}

/// Armed-state registry keyed by (symbol, hold side).
#[derive(Debug, Default)]
pub(crate) struct BreakEvenRegistry {
    armed: DashMap<(String, HoldSide), ()>,
}

impl BreakEvenRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_armed(&self, symbol: &Symbol, hold_side: HoldSide) -> bool {
        self.armed
            .contains_key(&(symbol.as_str().to_string(), hold_side))
    }

    pub(crate) fn arm(&self, symbol: &Symbol, hold_side: HoldSide) {
        self.armed
            .insert((symbol.as_str().to_string(), hold_side), ());
    }

    pub(crate) fn clear_symbol(&self, symbol: &Symbol) {
        self.armed.retain(|(s, _), _| s != symbol.as_str());
    }
}

impl PositionManager {
    /// Break-even check for a single position.
    ///
    /// Arms at most once: a second call without a close in between
    /// returns [`BreakEvenAction::AlreadyArmed`] and touches nothing on
    /// the exchange.
    #[allow(clippy::too_many_arguments)]
    pub async fn move_to_break_even(
        &self,
        symbol: &Symbol,
        hold_side: HoldSide,
        entry_price: Price,
        current_price: Price,
        profit_threshold: Decimal,
        buffer_percent: Decimal,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
    ) -> PositionResult<BreakEvenDetail> {
        let profit_percent = if entry_price.is_positive() {
            match hold_side {
                HoldSide::Long => current_price.pct_from(entry_price).unwrap_or_default(),
                HoldSide::Short => {
                    (entry_price.inner() - current_price.inner()) / entry_price.inner()
                }
            }
        } else {
            Decimal::ZERO
        };

        let mut detail = BreakEvenDetail {
            symbol: symbol.clone(),
            hold_side,
            entry_price,
            current_price,
            profit_percent,
            action: BreakEvenAction::WaitingForProfit,
            new_stop_loss: None,
        };

        if self.break_even.is_armed(symbol, hold_side) {
            detail.action = BreakEvenAction::AlreadyArmed;
            debug!(symbol = %symbol, hold_side = %hold_side, "Break-even already armed");
            return Ok(detail);
        }

        if profit_percent < profit_threshold {
            debug!(
                symbol = %symbol,
                hold_side = %hold_side,
                profit = %profit_percent,
                threshold = %profit_threshold,
                "Break-even waiting for profit"
            );
            return Ok(detail);
        }

        let new_stop_loss = match hold_side {
            HoldSide::Long => entry_price * (Decimal::ONE + buffer_percent),
            HoldSide::Short => entry_price * (Decimal::ONE - buffer_percent),
        }
        .round_dp(self.gateway.price_precision(symbol));

        // Move an existing stop on the same side if there is one;
        // otherwise create a fresh positional stop. Either way the stop
        // ends up at entry ± buffer, inside the normal SL distance band,
        // so this path does not run the safety distance check.
        let existing = self
            .gateway
            .get_active_plan_orders(symbol.clone(), product_type.clone(), None)
            .await?
            .into_iter()
            .find(|o| o.plan_type.is_stop_loss() && o.hold_side == hold_side);

        let action = match existing {
            Some(order) => {
                self.gateway
                    .modify_tpsl_order(ModifyTpslParams {
                        symbol: symbol.clone(),
                        order_id: Some(order.order_id),
                        client_oid: order.client_oid,
                        new_trigger_price: Some(new_stop_loss),
                        new_size: None,
                        new_execute_price: None,
                        new_range_rate: None,
                        trigger_type: TriggerType::MarkPrice,
                    })
                    .await?;
                BreakEvenAction::Modified
            }
            None => {
                self.gateway
                    .place_tpsl_order(PlanOrderParams {
                        symbol: symbol.clone(),
                        product_type: product_type.clone(),
                        margin_coin: margin_coin.clone(),
                        plan_type: wavex_core::PlanType::PosLoss,
                        hold_side,
                        trigger_price: new_stop_loss,
                        trigger_type: TriggerType::MarkPrice,
                        execute_price: None,
                        size: None,
                        range_rate: None,
                        client_oid: ClientOrderId::new(),
                        stp_mode: None,
                    })
                    .await?;
                BreakEvenAction::Created
            }
        };

        self.break_even.arm(symbol, hold_side);
        detail.action = action;
        detail.new_stop_loss = Some(new_stop_loss);
        info!(
            symbol = %symbol,
            hold_side = %hold_side,
            entry = %entry_price,
            new_stop_loss = %new_stop_loss,
            profit = %profit_percent,
            action = ?action,
            "Break-even armed"
        );
        Ok(detail)
    }

    /// Break-even sweep over all open positions of a symbol.
    ///
    /// Per-position failures are counted and collected; they do not stop
    /// the sweep. A failure to fetch positions or the ticker propagates.
    pub async fn auto_break_even(
        &self,
        symbol: &Symbol,
        profit_threshold: Decimal,
        buffer_percent: Decimal,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
    ) -> PositionResult<BreakEvenReport> {
        let positions = self
            .gateway
            .get_positions(
                Some(symbol.clone()),
                product_type.clone(),
                margin_coin.clone(),
            )
            .await?;

        let mut report = BreakEvenReport {
            success: true,
            ..Default::default()
        };
        let open: Vec<_> = positions.into_iter().filter(|p| p.is_open()).collect();
        if open.is_empty() {
            debug!(symbol = %symbol, "No open positions for break-even");
            return Ok(report);
        }

        let current_price = self
            .gateway
            .get_ticker_price(
                symbol.clone(),
                wavex_core::MarketType::Futures,
                product_type.clone(),
            )
            .await?;

        for position in open {
            match self
                .move_to_break_even(
                    symbol,
                    position.hold_side,
                    position.entry_price,
                    current_price,
                    profit_threshold,
                    buffer_percent,
                    product_type,
                    margin_coin,
                )
                .await
            {
                Ok(detail) => {
                    match detail.action {
                        BreakEvenAction::Created | BreakEvenAction::Modified => {
                            report.break_even_activated += 1;
                        }
                        BreakEvenAction::WaitingForProfit => {
                            report.waiting_for_profit += 1;
                        }
                        BreakEvenAction::AlreadyArmed => {}
                    }
                    report.details.push(detail);
                }
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        hold_side = %position.hold_side,
                        error = %e,
                        "Break-even check failed"
                    );
                    report.errors += 1;
                    report
                        .error_messages
                        .push(format!("{symbol}/{}: {e}", position.hold_side));
                }
            }
        }

        report.success = report.errors == 0;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use wavex_core::{PlanType, Size};
    use wavex_gateway::{MockExchangeGateway, PlanOrder, Position};
    use wavex_risk::{RiskConfig, RiskManager};

    fn setup() -> (Arc<MockExchangeGateway>, PositionManager) {
        let gateway = Arc::new(MockExchangeGateway::new());
        let risk = Arc::new(RiskManager::new(gateway.clone(), RiskConfig::default()));
        let manager = PositionManager::new(gateway.clone(), risk);
        (gateway, manager)
    }

    fn symbol() -> Symbol {
        Symbol::new("BTCUSDT")
    }

    fn long_position(entry: Decimal) -> Position {
        Position {
            symbol: symbol(),
            hold_side: HoldSide::Long,
            size: Size::new(dec!(1)),
            entry_price: Price::new(entry),
            unrealized_pnl: dec!(0),
            margin_size: dec!(100),
            leverage: dec!(10),
        }
    }

    #[tokio::test]
    async fn test_break_even_waits_below_threshold() {
        let (gateway, manager) = setup();
        gateway.set_positions(vec![long_position(dec!(100))]);
        gateway.set_ticker(Price::new(dec!(101))); // +1% < 3%

        let report = manager
            .auto_break_even(
                &symbol(),
                dec!(0.03),
                dec!(0.001),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.break_even_activated, 0);
        assert_eq!(report.waiting_for_profit, 1);
        assert!(gateway.tpsl_orders_placed().is_empty());
        assert!(gateway.modified_tpsl().is_empty());
    }

    #[tokio::test]
    async fn test_break_even_creates_stop_when_none_exists() {
        let (gateway, manager) = setup();
        gateway.set_positions(vec![long_position(dec!(100))]);
        gateway.set_ticker(Price::new(dec!(105))); // +5% >= 3%

        let report = manager
            .auto_break_even(
                &symbol(),
                dec!(0.03),
                dec!(0.001),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();

        assert_eq!(report.break_even_activated, 1);
        let placed = gateway.tpsl_orders_placed();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].plan_type, PlanType::PosLoss);
        // entry * (1 + 0.001) = 100.1
        assert_eq!(placed[0].trigger_price, Price::new(dec!(100.1)));
        assert!(placed[0].size.is_none());
    }

    #[tokio::test]
    async fn test_break_even_modifies_existing_stop() {
        let (gateway, manager) = setup();
        gateway.set_positions(vec![long_position(dec!(100))]);
        gateway.set_ticker(Price::new(dec!(105)));
        gateway.set_plan_orders(vec![PlanOrder {
            order_id: "sl-1".to_string(),
            client_oid: None,
            symbol: symbol(),
            plan_type: PlanType::PosLoss,
            hold_side: HoldSide::Long,
            trigger_price: Price::new(dec!(95)),
            size: None,
        }]);

        let report = manager
            .auto_break_even(
                &symbol(),
                dec!(0.03),
                dec!(0.001),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();

        assert_eq!(report.break_even_activated, 1);
        assert!(gateway.tpsl_orders_placed().is_empty());
        let modified = gateway.modified_tpsl();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].order_id.as_deref(), Some("sl-1"));
        assert_eq!(
            modified[0].new_trigger_price,
            Some(Price::new(dec!(100.1)))
        );
    }

    #[tokio::test]
    async fn test_break_even_is_idempotent() {
        let (gateway, manager) = setup();
        gateway.set_positions(vec![long_position(dec!(100))]);
        gateway.set_ticker(Price::new(dec!(105)));

        let first = manager
            .auto_break_even(
                &symbol(),
                dec!(0.03),
                dec!(0.001),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();
        assert_eq!(first.break_even_activated, 1);

        // Second sweep without price movement: no new gateway mutation.
        let second = manager
            .auto_break_even(
                &symbol(),
                dec!(0.03),
                dec!(0.001),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();
        assert_eq!(second.break_even_activated, 0);
        assert_eq!(gateway.tpsl_orders_placed().len(), 1);
        assert!(gateway.modified_tpsl().is_empty());
    }

    #[tokio::test]
    async fn test_break_even_short_side_math() {
        let (gateway, manager) = setup();
        gateway.set_positions(vec![Position {
            hold_side: HoldSide::Short,
            ..long_position(dec!(100))
        }]);
        gateway.set_ticker(Price::new(dec!(95))); // +5% for a short

        let report = manager
            .auto_break_even(
                &symbol(),
                dec!(0.03),
                dec!(0.001),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();

        assert_eq!(report.break_even_activated, 1);
        let placed = gateway.tpsl_orders_placed();
        // entry * (1 - 0.001) = 99.9
        assert_eq!(placed[0].trigger_price, Price::new(dec!(99.9)));
        assert_eq!(placed[0].hold_side, HoldSide::Short);
    }

    #[tokio::test]
    async fn test_close_clears_armed_state() {
        let (gateway, manager) = setup();
        gateway.set_positions(vec![long_position(dec!(100))]);
        gateway.set_ticker(Price::new(dec!(105)));

        manager
            .auto_break_even(
                &symbol(),
                dec!(0.03),
                dec!(0.001),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();
        assert!(manager.break_even.is_armed(&symbol(), HoldSide::Long));

        manager
            .close_position_full(&symbol(), &crate::request::CloseOptions::default())
            .await
            .unwrap();
        assert!(!manager.break_even.is_armed(&symbol(), HoldSide::Long));
    }

    #[tokio::test]
    async fn test_break_even_ignores_wrong_side_stop() {
        let (gateway, manager) = setup();
        gateway.set_positions(vec![long_position(dec!(100))]);
        gateway.set_ticker(Price::new(dec!(105)));
        // A short-side stop must not be modified for a long position.
        gateway.set_plan_orders(vec![PlanOrder {
            order_id: "sl-short".to_string(),
            client_oid: None,
            symbol: symbol(),
            plan_type: PlanType::PosLoss,
            hold_side: HoldSide::Short,
            trigger_price: Price::new(dec!(110)),
            size: None,
        }]);

        manager
            .auto_break_even(
                &symbol(),
                dec!(0.03),
                dec!(0.001),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();

        assert!(gateway.modified_tpsl().is_empty());
        assert_eq!(gateway.tpsl_orders_placed().len(), 1);
    }
}
