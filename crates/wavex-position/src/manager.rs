//! The position manager: open, close, leverage, emergency paths.
//!
//! Every operation fetches position truth fresh from the gateway; nothing
//! here caches exchange state.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wavex_core::{
    HoldSide, MarginCoin, OpenOutcome, OrderResult, OrderSide, OrderType, PositionAction, Price,
    ProductType, Size, SkipReason, Symbol,
};
use wavex_gateway::{ExchangeGateway, LeverageMode, OrderParams, Position};
use wavex_risk::{RiskManager, SafetyValidator};

use crate::break_even::BreakEvenRegistry;
use crate::error::{PositionError, PositionResult};
use crate::request::{CloseOptions, CloseSpec, LeverageUpdate, PositionRequest, Sizing};

/// A placed closing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseResult {
    pub order_id: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub hold_side: HoldSide,
    pub quantity: Size,
    pub raw_response: serde_json::Value,
}

/// Outcome of `emergency_close_all_positions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyCloseReport {
    pub positions_closed: u32,
    pub positions_failed: u32,
    pub errors: Vec<String>,
}

/// Single entry point for all position-affecting operations.
pub struct PositionManager {
    pub(crate) gateway: Arc<dyn ExchangeGateway>,
    pub(crate) risk: Arc<RiskManager>,
    pub(crate) safety: Option<SafetyValidator>,
    pub(crate) break_even: BreakEvenRegistry,
}

impl PositionManager {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, risk: Arc<RiskManager>) -> Self {
        Self {
            gateway,
            risk,
            safety: None,
            break_even: BreakEvenRegistry::new(),
        }
    }

    /// Enable the secondary safety validator for derivative orders.
    pub fn with_safety(mut self, safety: SafetyValidator) -> Self {
        self.safety = Some(safety);
        self
    }

    /// Open a position.
    ///
    /// Never places an order that has not passed risk validation.
    /// Business-rule refusals come back as [`OpenOutcome::Skipped`];
    /// malformed input is a [`PositionError::Validation`]; gateway
    /// failures propagate.
    pub async fn open_position(&self, req: &PositionRequest) -> PositionResult<OpenOutcome> {
        req.validate().map_err(PositionError::Validation)?;

        if !self.risk.is_trading_allowed(&req.product_type).await? {
            info!(symbol = %req.symbol, "Open skipped: trading disallowed");
            return Ok(OpenOutcome::Skipped(SkipReason::TradingDisallowed));
        }

        // Leverage first: quantity calculation depends on it.
        if req.market_type.is_futures() && req.leverage > Decimal::ZERO {
            self.gateway
                .set_leverage(
                    req.symbol.clone(),
                    req.product_type.clone(),
                    req.margin_coin.clone(),
                    LeverageMode::Uniform(req.leverage),
                )
                .await?;
        }

        let available_balance = self
            .gateway
            .get_available_balance(
                req.symbol.clone(),
                req.market_type,
                req.product_type.clone(),
                req.margin_coin.clone(),
            )
            .await?;

        let required_amount = match req.sizing {
            Sizing::Fixed(amount) => amount,
            Sizing::BalancePercentage(pct) => available_balance * pct,
        };

        let quantity = self
            .gateway
            .calculate_quantity(
                required_amount,
                req.symbol.clone(),
                req.market_type,
                req.side,
                req.order_type,
                req.leverage,
                req.product_type.clone(),
            )
            .await?;

        // Documented skip, not an error: the amount rounded to nothing.
        if !quantity.is_positive() {
            warn!(
                symbol = %req.symbol,
                required_amount = %required_amount,
                "Open skipped: calculated quantity is zero"
            );
            return Ok(OpenOutcome::Skipped(SkipReason::ZeroQuantity));
        }

        if !self
            .risk
            .validate_position(
                &req.symbol,
                required_amount,
                quantity,
                req.market_type,
                &req.product_type,
                &req.margin_coin,
                req.leverage,
                req.order_type,
            )
            .await?
        {
            return Ok(OpenOutcome::Skipped(SkipReason::RiskRejected));
        }

        let params = self.create_order_params(req, quantity);
        let placed = self
            .gateway
            .place_order(
                params,
                req.product_type.clone(),
                req.margin_coin.clone(),
                req.margin_mode,
            )
            .await?;

        let estimated_entry_price =
            OrderResult::estimate_entry_price(required_amount, quantity);
        info!(
            symbol = %req.symbol,
            side = %req.side,
            quantity = %quantity,
            estimated_entry = %estimated_entry_price,
            order_id = %placed.order_id,
            "Position order placed"
        );

        Ok(OpenOutcome::Placed(OrderResult {
            order_id: placed.order_id,
            symbol: req.symbol.clone(),
            side: req.side,
            quantity,
            estimated_entry_price,
            order_type: req.order_type,
            market_type: req.market_type,
            raw_response: placed.raw,
        }))
    }

    /// Logical order parameters for an opening order.
    ///
    /// Exchange-specific margin fields and tradeSide are attached by the
    /// gateway at place time.
    fn create_order_params(&self, req: &PositionRequest, quantity: Size) -> OrderParams {
        OrderParams::new(
            req.symbol.clone(),
            req.side,
            quantity,
            req.order_type,
            PositionAction::Open,
            req.market_type,
        )
    }

    /// Open positions, fetched fresh from the exchange.
    pub async fn get_current_positions(
        &self,
        symbol: Option<Symbol>,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
    ) -> PositionResult<Vec<Position>> {
        Ok(self
            .gateway
            .get_positions(symbol, product_type.clone(), margin_coin.clone())
            .await?)
    }

    /// Close part of a position.
    ///
    /// The close quantity is clamped by validation: it can never exceed
    /// the current position size. The close side is the inverse of the
    /// hold side.
    pub async fn close_position_partial(
        &self,
        symbol: &Symbol,
        spec: CloseSpec,
        opts: &CloseOptions,
    ) -> PositionResult<CloseResult> {
        let positions = self
            .gateway
            .get_positions(
                Some(symbol.clone()),
                opts.product_type.clone(),
                opts.margin_coin.clone(),
            )
            .await?;
        let position = positions
            .into_iter()
            .find(|p| p.is_open())
            .ok_or_else(|| {
                PositionError::Validation(format!("no open position for {symbol}"))
            })?;

        let position_size = position.size.abs();
        let close_quantity = match spec {
            CloseSpec::Percent(pct) => {
                if pct <= Decimal::ZERO || pct > Decimal::ONE {
                    return Err(PositionError::Validation(format!(
                        "close percent must be in (0, 1] (got {pct})"
                    )));
                }
                position_size * pct
            }
            CloseSpec::Fixed(quantity) => quantity,
        };
        let close_quantity = close_quantity.round_dp(self.gateway.size_precision(symbol));

        if !close_quantity.is_positive() {
            return Err(PositionError::Validation(
                "close quantity rounded to zero".to_string(),
            ));
        }
        if close_quantity > position_size {
            return Err(PositionError::Validation(format!(
                "close quantity {close_quantity} exceeds position size {position_size}"
            )));
        }

        let close_side = position.hold_side.close_side();
        let mut params = OrderParams::new(
            symbol.clone(),
            close_side,
            close_quantity,
            opts.order_type,
            PositionAction::Close,
            wavex_core::MarketType::Futures,
        );
        if let Some(price) = opts.price {
            params = params.with_price(price);
        }

        let placed = self
            .gateway
            .place_order(
                params,
                opts.product_type.clone(),
                opts.margin_coin.clone(),
                wavex_core::MarginMode::Crossed,
            )
            .await?;

        // A fresh position must re-arm break-even from scratch.
        self.break_even.clear_symbol(symbol);

        info!(
            symbol = %symbol,
            hold_side = %position.hold_side,
            quantity = %close_quantity,
            order_id = %placed.order_id,
            "Close order placed"
        );

        Ok(CloseResult {
            order_id: placed.order_id,
            symbol: symbol.clone(),
            side: close_side,
            hold_side: position.hold_side,
            quantity: close_quantity,
            raw_response: placed.raw,
        })
    }

    /// Close a fraction of the position (0, 1].
    pub async fn close_position_by_percent(
        &self,
        symbol: &Symbol,
        close_percent: Decimal,
        opts: &CloseOptions,
    ) -> PositionResult<CloseResult> {
        self.close_position_partial(symbol, CloseSpec::Percent(close_percent), opts)
            .await
    }

    /// Close a fixed base-currency amount.
    pub async fn close_position_by_amount(
        &self,
        symbol: &Symbol,
        close_amount: Size,
        opts: &CloseOptions,
    ) -> PositionResult<CloseResult> {
        self.close_position_partial(symbol, CloseSpec::Fixed(close_amount), opts)
            .await
    }

    /// Close the whole position.
    pub async fn close_position_full(
        &self,
        symbol: &Symbol,
        opts: &CloseOptions,
    ) -> PositionResult<CloseResult> {
        self.close_position_partial(symbol, CloseSpec::Percent(Decimal::ONE), opts)
            .await
    }

    /// Apply a leverage change, one mode per call.
    pub async fn set_leverage(
        &self,
        symbol: &Symbol,
        update: LeverageUpdate,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
    ) -> PositionResult<LeverageMode> {
        let mode = update.resolve().map_err(PositionError::Validation)?;
        self.gateway
            .set_leverage(
                symbol.clone(),
                product_type.clone(),
                margin_coin.clone(),
                mode,
            )
            .await?;
        info!(symbol = %symbol, mode = ?mode, "Leverage updated");
        Ok(mode)
    }

    /// Close every open position at market.
    ///
    /// Destructive; refuses to run without `confirm_close`. Failures on
    /// one position do not stop the others.
    pub async fn emergency_close_all_positions(
        &self,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
        confirm_close: bool,
    ) -> PositionResult<EmergencyCloseReport> {
        if !confirm_close {
            return Err(PositionError::Validation(
                "emergency close requires confirm_close = true".to_string(),
            ));
        }

        let positions = self
            .gateway
            .get_positions(None, product_type.clone(), margin_coin.clone())
            .await?;

        let mut report = EmergencyCloseReport::default();
        let opts = CloseOptions {
            product_type: product_type.clone(),
            margin_coin: margin_coin.clone(),
            order_type: OrderType::Market,
            price: None,
        };

        for position in positions.iter().filter(|p| p.is_open()) {
            match self
                .close_position_full(&position.symbol, &opts)
                .await
            {
                Ok(result) => {
                    report.positions_closed += 1;
                    info!(
                        symbol = %result.symbol,
                        order_id = %result.order_id,
                        "Emergency close placed"
                    );
                }
                Err(e) => {
                    report.positions_failed += 1;
                    report
                        .errors
                        .push(format!("{}: {e}", position.symbol));
                    warn!(symbol = %position.symbol, error = %e, "Emergency close failed");
                }
            }
        }

        Ok(report)
    }

    /// Stop-loss trigger price derived from entry and hold side.
    pub(crate) fn stop_price_from_percent(
        hold_side: HoldSide,
        entry_price: Price,
        percent: Decimal,
    ) -> Price {
        match hold_side {
            HoldSide::Long => entry_price * (Decimal::ONE - percent),
            HoldSide::Short => entry_price * (Decimal::ONE + percent),
        }
    }

    /// Take-profit trigger price derived from entry and hold side.
    pub(crate) fn profit_price_from_percent(
        hold_side: HoldSide,
        entry_price: Price,
        percent: Decimal,
    ) -> Price {
        match hold_side {
            HoldSide::Long => entry_price * (Decimal::ONE + percent),
            HoldSide::Short => entry_price * (Decimal::ONE - percent),
        }
    }
}
