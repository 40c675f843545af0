//! Signal routing: strategy signals to position-manager calls.
//!
//! State mutation happens only after the order call returns, so an
//! interrupted cycle cannot leave `StrategyState` claiming a position
//! that was never opened. Errors propagate to the per-cycle handler.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use wavex_core::{MarginCoin, MarginMode, OrderSide, OrderType, ProductType, Symbol};
use wavex_position::{CloseOptions, PositionManager, PositionRequest, Sizing};

use crate::error::StrategyResult;
use crate::signal::Signal;
use crate::state::StrategyState;

/// Per-session order parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub symbol: Symbol,
    /// Fixed quote-currency amount per entry and per averaging buy-in.
    pub amount: Decimal,
    pub leverage: Decimal,
    #[serde(default)]
    pub product_type: ProductType,
    #[serde(default)]
    pub margin_coin: MarginCoin,
    #[serde(default)]
    pub margin_mode: MarginMode,
}

/// Maps strategy signals onto the position manager and keeps
/// [`StrategyState`] in step with executed orders.
pub struct SignalRouter {
    position_manager: Arc<PositionManager>,
    config: RouterConfig,
}

impl SignalRouter {
    pub fn new(position_manager: Arc<PositionManager>, config: RouterConfig) -> Self {
        Self {
            position_manager,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Handle one signal, mutating `state` transactionally.
    ///
    /// Precondition violations are logged skips, not errors: the
    /// strategy and the executed state can disagree transiently after a
    /// skipped order.
    pub async fn handle_signal(
        &self,
        state: &mut StrategyState,
        signal: Signal,
    ) -> StrategyResult<()> {
        info!(signal = %signal, "Signal received");

        match signal {
            Signal::BuyX { price } => {
                if state.position_open {
                    warn!("BUYX ignored: position already open");
                    return Ok(());
                }

                let outcome = self
                    .position_manager
                    .open_position(&self.open_request())
                    .await?;

                if outcome.is_placed() {
                    state.open_at(price);
                    info!(entry = %price, "Executed BUYX");
                } else {
                    info!(?outcome, "BUYX skipped, state unchanged");
                }
            }

            Signal::Averaging { index, price } => {
                if !state.position_open {
                    warn!(index, "Averaging ignored: no open position");
                    return Ok(());
                }
                let Some(level) = state.averaging_levels.get(index) else {
                    warn!(index, "Averaging ignored: no such level");
                    return Ok(());
                };
                if !level.enabled || level.filled {
                    warn!(index, "Averaging ignored: level disabled or already filled");
                    return Ok(());
                }

                self.position_manager
                    .open_position(&self.open_request())
                    .await?;

                // Marked regardless of a skipped outcome, and the entry
                // price is not re-blended. Matches the source behavior;
                // changing either is a product decision.
                state.averaging_levels[index].filled = true;
                info!(index, price = %price, "Executed AVER{}", index + 1);
            }

            Signal::CloseX { price } => {
                if !state.position_open {
                    warn!("CLOSEX ignored: no open position");
                    return Ok(());
                }

                self.position_manager
                    .close_position_full(
                        &self.config.symbol,
                        &CloseOptions {
                            product_type: self.config.product_type.clone(),
                            margin_coin: self.config.margin_coin.clone(),
                            order_type: OrderType::Market,
                            price: None,
                        },
                    )
                    .await?;

                state.reset();
                info!(price = %price, "Executed CLOSEX");
            }
        }

        Ok(())
    }

    fn open_request(&self) -> PositionRequest {
        PositionRequest {
            symbol: self.config.symbol.clone(),
            side: OrderSide::Buy,
            sizing: Sizing::Fixed(self.config.amount),
            order_type: OrderType::Market,
            market_type: wavex_core::MarketType::Futures,
            leverage: self.config.leverage,
            product_type: self.config.product_type.clone(),
            margin_coin: self.config.margin_coin.clone(),
            margin_mode: self.config.margin_mode,
        }
    }
}
