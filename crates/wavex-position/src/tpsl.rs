//! Derivative orders: stop-loss, take-profit, trailing stop, and
//! partial take-profit ladders.
//!
//! Direction invariants are checked synchronously before any network
//! call; the safety validator then checks trigger prices against the
//! live market. A safety rejection aborts the whole operation with a
//! structured report and submits nothing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wavex_core::{
    ClientOrderId, HoldSide, MarginCoin, MarketType, OrderType, PlanType, Price, ProductType,
    Size, Symbol, TriggerType,
};
use wavex_gateway::{ExchangeGateway, PlacedOrder, PlanOrderParams};
use wavex_risk::{PriceKind, SafetyReport};

use crate::error::{PositionError, PositionResult};
use crate::manager::PositionManager;

/// Stop-loss trigger reference: absolute price or a drop from entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StopRef {
    Price(Price),
    PercentFromEntry { percent: Decimal, entry_price: Price },
}

/// Trailing-stop activation reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    Price(Price),
    ProfitPercent { percent: Decimal, entry_price: Price },
}

/// Result of a derivative-order operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TpslOutcome {
    /// Order submitted.
    Placed {
        order: PlacedOrder,
        trigger_price: Price,
        plan_type: PlanType,
    },
    /// Safety checks failed; nothing was submitted.
    SafetyRejected(SafetyReport),
}

impl TpslOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed { .. })
    }
}

/// Stop-loss request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossSpec {
    pub symbol: Symbol,
    pub hold_side: HoldSide,
    pub stop: StopRef,
    /// Entry price for the direction check of the absolute-price form.
    pub entry_price: Option<Price>,
    pub product_type: ProductType,
    pub margin_coin: MarginCoin,
    /// None places a positional stop covering the whole position.
    pub size: Option<Size>,
    /// Execution price once triggered; None executes at market.
    pub execute_price: Option<Price>,
    pub trigger_type: TriggerType,
    /// Caller-supplied cloid; a fresh one is generated when absent.
    pub client_oid: Option<ClientOrderId>,
    pub stp_mode: Option<String>,
}

impl StopLossSpec {
    pub fn new(symbol: Symbol, hold_side: HoldSide, stop: StopRef) -> Self {
        Self {
            symbol,
            hold_side,
            stop,
            entry_price: None,
            product_type: ProductType::default(),
            margin_coin: MarginCoin::default(),
            size: None,
            execute_price: None,
            trigger_type: TriggerType::MarkPrice,
            client_oid: None,
            stp_mode: None,
        }
    }

    pub fn with_entry_price(mut self, entry_price: Price) -> Self {
        self.entry_price = Some(entry_price);
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }
}

/// Take-profit request; mirrors [`StopLossSpec`] with inverted direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitSpec {
    pub symbol: Symbol,
    pub hold_side: HoldSide,
    pub target: StopRef,
    pub entry_price: Option<Price>,
    pub product_type: ProductType,
    pub margin_coin: MarginCoin,
    pub size: Option<Size>,
    pub execute_price: Option<Price>,
    pub trigger_type: TriggerType,
    /// Caller-supplied cloid; a fresh one is generated when absent.
    pub client_oid: Option<ClientOrderId>,
    pub stp_mode: Option<String>,
}

impl TakeProfitSpec {
    pub fn new(symbol: Symbol, hold_side: HoldSide, target: StopRef) -> Self {
        Self {
            symbol,
            hold_side,
            target,
            entry_price: None,
            product_type: ProductType::default(),
            margin_coin: MarginCoin::default(),
            size: None,
            execute_price: None,
            trigger_type: TriggerType::MarkPrice,
            client_oid: None,
            stp_mode: None,
        }
    }

    pub fn with_entry_price(mut self, entry_price: Price) -> Self {
        self.entry_price = Some(entry_price);
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }
}

/// Trailing-stop request. Size is mandatory: the exchange has no
/// positional trailing plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopSpec {
    pub symbol: Symbol,
    pub hold_side: HoldSide,
    pub size: Size,
    /// Trailing distance as a fraction (0, 1]; rounded to 2 decimals.
    pub range_rate: Decimal,
    pub activation: Activation,
    pub entry_price: Option<Price>,
    pub product_type: ProductType,
    pub margin_coin: MarginCoin,
    pub trigger_type: TriggerType,
    /// Caller-supplied cloid; a fresh one is generated when absent.
    pub client_oid: Option<ClientOrderId>,
    pub stp_mode: Option<String>,
}

impl TrailingStopSpec {
    pub fn new(
        symbol: Symbol,
        hold_side: HoldSide,
        size: Size,
        range_rate: Decimal,
        activation: Activation,
    ) -> Self {
        Self {
            symbol,
            hold_side,
            size,
            range_rate,
            activation,
            entry_price: None,
            product_type: ProductType::default(),
            margin_coin: MarginCoin::default(),
            trigger_type: TriggerType::MarkPrice,
            client_oid: None,
            stp_mode: None,
        }
    }

    pub fn with_entry_price(mut self, entry_price: Price) -> Self {
        self.entry_price = Some(entry_price);
        self
    }
}

/// One partial take-profit target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialTarget {
    /// Fraction of the total size to close at this target.
    pub percent: Decimal,
    pub price: Price,
}

/// One profit-based level: close `close_percent` once `profit_percent`
/// of gain is reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitLevel {
    pub profit_percent: Decimal,
    pub close_percent: Decimal,
}

/// Per-target placement result, tagged with its target index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetResult {
    pub index: usize,
    pub percent: Decimal,
    pub price: Price,
    pub size: Size,
    pub result: Result<PlacedOrder, String>,
}

/// Aggregate result of a partial take-profit ladder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialTpReport {
    pub placed: u32,
    pub failed: u32,
    pub results: Vec<TargetResult>,
}

/// Tolerance for the partial-TP percent sum.
const PERCENT_SUM_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3); // 0.001

impl PositionManager {
    /// Place a stop-loss.
    ///
    /// Direction invariant: a long stop must sit below entry, a short
    /// stop above. Plan type is positional (`pos_loss`) without a size,
    /// `loss_plan` with one.
    pub async fn set_stop_loss(&self, spec: StopLossSpec) -> PositionResult<TpslOutcome> {
        let (raw_price, entry) = match spec.stop {
            StopRef::Price(price) => (price, spec.entry_price),
            StopRef::PercentFromEntry {
                percent,
                entry_price,
            } => {
                check_percent(percent, "stop_loss_percent")?;
                (
                    Self::stop_price_from_percent(spec.hold_side, entry_price, percent),
                    Some(entry_price),
                )
            }
        };

        if let Some(entry) = entry {
            match spec.hold_side {
                HoldSide::Long if raw_price >= entry => {
                    return Err(PositionError::Validation(format!(
                        "stop-loss for long must be below entry: {raw_price} >= {entry}"
                    )));
                }
                HoldSide::Short if raw_price <= entry => {
                    return Err(PositionError::Validation(format!(
                        "stop-loss for short must be above entry: {raw_price} <= {entry}"
                    )));
                }
                _ => {}
            }
        }

        let trigger_price = raw_price.round_dp(self.gateway.price_precision(&spec.symbol));

        if let Some(safety) = &self.safety {
            let report = safety
                .validate_price(
                    &spec.symbol,
                    trigger_price,
                    PriceKind::StopLoss,
                    Some(spec.hold_side),
                    None,
                )
                .await?;
            if !report.valid {
                return Ok(TpslOutcome::SafetyRejected(report));
            }
        }

        let plan_type = match spec.size {
            None => PlanType::PosLoss,
            Some(_) => PlanType::LossPlan,
        };
        let placed = self
            .gateway
            .place_tpsl_order(PlanOrderParams {
                symbol: spec.symbol.clone(),
                product_type: spec.product_type.clone(),
                margin_coin: spec.margin_coin.clone(),
                plan_type,
                hold_side: spec.hold_side,
                trigger_price,
                trigger_type: spec.trigger_type,
                execute_price: spec.execute_price,
                size: spec.size,
                range_rate: None,
                client_oid: spec.client_oid.clone().unwrap_or_default(),
                stp_mode: spec.stp_mode.clone(),
            })
            .await?;

        info!(
            symbol = %spec.symbol,
            hold_side = %spec.hold_side,
            trigger = %trigger_price,
            plan_type = %plan_type,
            "Stop-loss placed"
        );
        Ok(TpslOutcome::Placed {
            order: placed,
            trigger_price,
            plan_type,
        })
    }

    /// Positional stop-loss at a fixed price.
    pub async fn set_stop_loss_fixed(
        &self,
        symbol: Symbol,
        hold_side: HoldSide,
        stop_loss_price: Price,
        size: Option<Size>,
    ) -> PositionResult<TpslOutcome> {
        let mut spec = StopLossSpec::new(symbol, hold_side, StopRef::Price(stop_loss_price));
        spec.size = size;
        self.set_stop_loss(spec).await
    }

    /// Stop-loss at a percentage drop from entry.
    pub async fn set_stop_loss_percent(
        &self,
        symbol: Symbol,
        hold_side: HoldSide,
        entry_price: Price,
        stop_loss_percent: Decimal,
        size: Option<Size>,
    ) -> PositionResult<TpslOutcome> {
        let mut spec = StopLossSpec::new(
            symbol,
            hold_side,
            StopRef::PercentFromEntry {
                percent: stop_loss_percent,
                entry_price,
            },
        );
        spec.size = size;
        self.set_stop_loss(spec).await
    }

    /// Place a take-profit.
    ///
    /// Direction invariant mirrors the stop-loss: a long target sits
    /// above entry, a short target below.
    pub async fn set_take_profit_futures(
        &self,
        spec: TakeProfitSpec,
    ) -> PositionResult<TpslOutcome> {
        let (raw_price, entry) = match spec.target {
            StopRef::Price(price) => (price, spec.entry_price),
            StopRef::PercentFromEntry {
                percent,
                entry_price,
            } => {
                check_percent(percent, "tp_percent")?;
                (
                    Self::profit_price_from_percent(spec.hold_side, entry_price, percent),
                    Some(entry_price),
                )
            }
        };

        if let Some(entry) = entry {
            match spec.hold_side {
                HoldSide::Long if raw_price <= entry => {
                    return Err(PositionError::Validation(format!(
                        "take-profit for long must be above entry: {raw_price} <= {entry}"
                    )));
                }
                HoldSide::Short if raw_price >= entry => {
                    return Err(PositionError::Validation(format!(
                        "take-profit for short must be below entry: {raw_price} >= {entry}"
                    )));
                }
                _ => {}
            }
        }

        let trigger_price = raw_price.round_dp(self.gateway.price_precision(&spec.symbol));

        if let Some(safety) = &self.safety {
            let report = safety
                .validate_price(
                    &spec.symbol,
                    trigger_price,
                    PriceKind::TakeProfit,
                    Some(spec.hold_side),
                    None,
                )
                .await?;
            if !report.valid {
                return Ok(TpslOutcome::SafetyRejected(report));
            }
        }

        let plan_type = match spec.size {
            None => PlanType::PosProfit,
            Some(_) => PlanType::ProfitPlan,
        };
        let placed = self
            .gateway
            .place_tpsl_order(PlanOrderParams {
                symbol: spec.symbol.clone(),
                product_type: spec.product_type.clone(),
                margin_coin: spec.margin_coin.clone(),
                plan_type,
                hold_side: spec.hold_side,
                trigger_price,
                trigger_type: spec.trigger_type,
                execute_price: spec.execute_price,
                size: spec.size,
                range_rate: None,
                client_oid: spec.client_oid.clone().unwrap_or_default(),
                stp_mode: spec.stp_mode.clone(),
            })
            .await?;

        info!(
            symbol = %spec.symbol,
            hold_side = %spec.hold_side,
            trigger = %trigger_price,
            plan_type = %plan_type,
            "Take-profit placed"
        );
        Ok(TpslOutcome::Placed {
            order: placed,
            trigger_price,
            plan_type,
        })
    }

    /// Positional take-profit at a fixed price.
    pub async fn set_take_profit_fixed(
        &self,
        symbol: Symbol,
        hold_side: HoldSide,
        tp_price: Price,
        size: Option<Size>,
    ) -> PositionResult<TpslOutcome> {
        let mut spec = TakeProfitSpec::new(symbol, hold_side, StopRef::Price(tp_price));
        spec.size = size;
        self.set_take_profit_futures(spec).await
    }

    /// Take-profit at a percentage gain from entry.
    pub async fn set_take_profit_percent(
        &self,
        symbol: Symbol,
        hold_side: HoldSide,
        entry_price: Price,
        tp_percent: Decimal,
        size: Option<Size>,
    ) -> PositionResult<TpslOutcome> {
        let mut spec = TakeProfitSpec::new(
            symbol,
            hold_side,
            StopRef::PercentFromEntry {
                percent: tp_percent,
                entry_price,
            },
        );
        spec.size = size;
        self.set_take_profit_futures(spec).await
    }

    /// Place a trailing stop (`moving_plan`).
    ///
    /// The range rate is rounded to 2 decimal places, a hard exchange
    /// precision limit. The activation price must sit beyond entry in the
    /// position's favorable direction.
    pub async fn set_trailing_stop(
        &self,
        spec: TrailingStopSpec,
    ) -> PositionResult<TpslOutcome> {
        if !spec.size.is_positive() {
            return Err(PositionError::Validation(
                "trailing stop requires a positive size".to_string(),
            ));
        }
        if spec.range_rate <= Decimal::ZERO || spec.range_rate > Decimal::ONE {
            return Err(PositionError::Validation(format!(
                "range_rate must be in (0, 1] (got {})",
                spec.range_rate
            )));
        }
        let range_rate = spec.range_rate.round_dp(2);
        if range_rate.is_zero() {
            return Err(PositionError::Validation(format!(
                "range_rate {} rounds to zero at the 2-decimal exchange limit",
                spec.range_rate
            )));
        }

        let (raw_price, entry) = match spec.activation {
            Activation::Price(price) => (price, spec.entry_price),
            Activation::ProfitPercent {
                percent,
                entry_price,
            } => {
                check_percent(percent, "activation_profit_percent")?;
                (
                    Self::profit_price_from_percent(spec.hold_side, entry_price, percent),
                    Some(entry_price),
                )
            }
        };

        if let Some(entry) = entry {
            match spec.hold_side {
                HoldSide::Long if raw_price <= entry => {
                    return Err(PositionError::Validation(format!(
                        "trailing activation for long must be above entry: {raw_price} <= {entry}"
                    )));
                }
                HoldSide::Short if raw_price >= entry => {
                    return Err(PositionError::Validation(format!(
                        "trailing activation for short must be below entry: {raw_price} >= {entry}"
                    )));
                }
                _ => {}
            }
        }

        let trigger_price = raw_price.round_dp(self.gateway.price_precision(&spec.symbol));

        let placed = self
            .gateway
            .place_plan_order(
                PlanOrderParams {
                    symbol: spec.symbol.clone(),
                    product_type: spec.product_type.clone(),
                    margin_coin: spec.margin_coin.clone(),
                    plan_type: PlanType::MovingPlan,
                    hold_side: spec.hold_side,
                    trigger_price,
                    trigger_type: spec.trigger_type,
                    execute_price: None,
                    size: Some(spec.size),
                    range_rate: Some(range_rate),
                    client_oid: spec.client_oid.clone().unwrap_or_default(),
                    stp_mode: spec.stp_mode.clone(),
                },
                MarketType::Futures,
            )
            .await?;

        info!(
            symbol = %spec.symbol,
            hold_side = %spec.hold_side,
            activation = %trigger_price,
            range_rate = %range_rate,
            "Trailing stop placed"
        );
        Ok(TpslOutcome::Placed {
            order: placed,
            trigger_price,
            plan_type: PlanType::MovingPlan,
        })
    }

    /// Place a ladder of partial take-profit orders.
    ///
    /// Target percents must sum to 1 within 1e-3. Non-monotonic target
    /// prices (long: increasing, short: decreasing) only warn. Each
    /// target is placed independently; one failure does not abort the
    /// rest.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_partial_take_profit(
        &self,
        symbol: &Symbol,
        hold_side: HoldSide,
        targets: &[PartialTarget],
        total_size: Size,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
        trigger_type: TriggerType,
        execute_price: Option<Price>,
    ) -> PositionResult<PartialTpReport> {
        if targets.is_empty() {
            return Err(PositionError::Validation(
                "partial take-profit requires at least one target".to_string(),
            ));
        }
        if !total_size.is_positive() {
            return Err(PositionError::Validation(
                "partial take-profit requires a positive total size".to_string(),
            ));
        }
        for target in targets {
            if target.percent <= Decimal::ZERO {
                return Err(PositionError::Validation(format!(
                    "target percent must be positive (got {})",
                    target.percent
                )));
            }
        }
        let sum: Decimal = targets.iter().map(|t| t.percent).sum();
        if (sum - Decimal::ONE).abs() > PERCENT_SUM_TOLERANCE {
            return Err(PositionError::Validation(format!(
                "target percents must sum to 1.0 (got {sum})"
            )));
        }

        let monotonic = targets.windows(2).all(|w| match hold_side {
            HoldSide::Long => w[1].price > w[0].price,
            HoldSide::Short => w[1].price < w[0].price,
        });
        if !monotonic {
            warn!(
                symbol = %symbol,
                hold_side = %hold_side,
                "Partial take-profit targets are not monotonic for this side"
            );
        }

        let size_precision = self.gateway.size_precision(symbol);
        let price_precision = self.gateway.price_precision(symbol);
        let mut report = PartialTpReport::default();

        for (index, target) in targets.iter().enumerate() {
            let size = (total_size * target.percent).round_dp(size_precision);
            let price = target.price.round_dp(price_precision);

            let result = self
                .gateway
                .place_tpsl_order(PlanOrderParams {
                    symbol: symbol.clone(),
                    product_type: product_type.clone(),
                    margin_coin: margin_coin.clone(),
                    plan_type: PlanType::ProfitPlan,
                    hold_side,
                    trigger_price: price,
                    trigger_type,
                    execute_price,
                    size: Some(size),
                    range_rate: None,
                    client_oid: ClientOrderId::new(),
                    stp_mode: None,
                })
                .await;

            match result {
                Ok(order) => {
                    report.placed += 1;
                    report.results.push(TargetResult {
                        index,
                        percent: target.percent,
                        price,
                        size,
                        result: Ok(order),
                    });
                }
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        index,
                        error = %e,
                        "Partial take-profit target failed"
                    );
                    report.failed += 1;
                    report.results.push(TargetResult {
                        index,
                        percent: target.percent,
                        price,
                        size,
                        result: Err(e.to_string()),
                    });
                }
            }
        }

        info!(
            symbol = %symbol,
            placed = report.placed,
            failed = report.failed,
            "Partial take-profit ladder submitted"
        );
        Ok(report)
    }

    /// Pending entry order (`normal_plan`): queues an order that
    /// activates when price crosses the trigger.
    ///
    /// Limit pending orders need an execution price; market ones
    /// execute at market once triggered.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_pending_order(
        &self,
        symbol: Symbol,
        hold_side: HoldSide,
        quantity: Size,
        trigger_price: Price,
        order_type: OrderType,
        execute_price: Option<Price>,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
    ) -> PositionResult<TpslOutcome> {
        if !quantity.is_positive() {
            return Err(PositionError::Validation(
                "pending order requires a positive quantity".to_string(),
            ));
        }
        if !trigger_price.is_positive() {
            return Err(PositionError::Validation(
                "pending order requires a positive trigger price".to_string(),
            ));
        }
        if order_type == OrderType::Limit && execute_price.is_none() {
            return Err(PositionError::Validation(
                "limit pending order requires an execution price".to_string(),
            ));
        }

        let trigger_price = trigger_price.round_dp(self.gateway.price_precision(&symbol));

        if let Some(safety) = &self.safety {
            let report = safety
                .validate_price(&symbol, trigger_price, PriceKind::Trigger, None, None)
                .await?;
            if !report.valid {
                return Ok(TpslOutcome::SafetyRejected(report));
            }
        }

        let placed = self
            .gateway
            .place_plan_order(
                PlanOrderParams {
                    symbol: symbol.clone(),
                    product_type: product_type.clone(),
                    margin_coin: margin_coin.clone(),
                    plan_type: PlanType::NormalPlan,
                    hold_side,
                    trigger_price,
                    trigger_type: TriggerType::MarkPrice,
                    execute_price,
                    size: Some(quantity),
                    range_rate: None,
                    client_oid: ClientOrderId::new(),
                    stp_mode: None,
                },
                MarketType::Futures,
            )
            .await?;

        info!(
            symbol = %symbol,
            hold_side = %hold_side,
            trigger = %trigger_price,
            quantity = %quantity,
            "Pending entry order placed"
        );
        Ok(TpslOutcome::Placed {
            order: placed,
            trigger_price,
            plan_type: PlanType::NormalPlan,
        })
    }

    /// Take-profit ladder expressed as profit levels from entry.
    ///
    /// Each level closes `close_percent` of the position once
    /// `profit_percent` of gain is reached; levels are mapped to absolute
    /// prices and routed through the partial take-profit path.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_profit_based_take_profit(
        &self,
        symbol: &Symbol,
        hold_side: HoldSide,
        entry_price: Price,
        levels: &[ProfitLevel],
        total_size: Size,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
    ) -> PositionResult<PartialTpReport> {
        if !entry_price.is_positive() {
            return Err(PositionError::Validation(
                "profit-based take-profit requires a positive entry price".to_string(),
            ));
        }
        for level in levels {
            if level.profit_percent <= Decimal::ZERO {
                return Err(PositionError::Validation(format!(
                    "profit percent must be positive (got {})",
                    level.profit_percent
                )));
            }
        }

        let targets: Vec<PartialTarget> = levels
            .iter()
            .map(|level| PartialTarget {
                percent: level.close_percent,
                price: Self::profit_price_from_percent(
                    hold_side,
                    entry_price,
                    level.profit_percent,
                ),
            })
            .collect();

        self.set_partial_take_profit(
            symbol,
            hold_side,
            &targets,
            total_size,
            product_type,
            margin_coin,
            TriggerType::MarkPrice,
            None,
        )
        .await
    }
}

fn check_percent(percent: Decimal, what: &str) -> PositionResult<()> {
    if percent <= Decimal::ZERO || percent >= Decimal::ONE {
        return Err(PositionError::Validation(format!(
            "{what} must be in (0, 1) (got {percent})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use wavex_gateway::MockExchangeGateway;
    use wavex_risk::{RiskConfig, RiskManager, SafetyConfig, SafetyValidator};

    fn setup() -> (Arc<MockExchangeGateway>, PositionManager) {
        let gateway = Arc::new(MockExchangeGateway::new());
        let risk = Arc::new(RiskManager::new(gateway.clone(), RiskConfig::default()));
        let manager = PositionManager::new(gateway.clone(), risk);
        (gateway, manager)
    }

    fn setup_with_safety() -> (Arc<MockExchangeGateway>, PositionManager) {
        let gateway = Arc::new(MockExchangeGateway::new());
        let risk = Arc::new(RiskManager::new(gateway.clone(), RiskConfig::default()));
        let safety = SafetyValidator::new(gateway.clone(), SafetyConfig::default());
        let manager = PositionManager::new(gateway.clone(), risk).with_safety(safety);
        (gateway, manager)
    }

    fn symbol() -> Symbol {
        Symbol::new("BTCUSDT")
    }

    #[tokio::test]
    async fn test_stop_loss_percent_long() {
        let (gateway, manager) = setup();

        // entry 42000, 10% drop -> 37800
        let outcome = manager
            .set_stop_loss_percent(
                symbol(),
                HoldSide::Long,
                Price::new(dec!(42000)),
                dec!(0.10),
                None,
            )
            .await
            .unwrap();

        match outcome {
            TpslOutcome::Placed {
                trigger_price,
                plan_type,
                ..
            } => {
                assert_eq!(trigger_price, Price::new(dec!(37800)));
                assert_eq!(plan_type, PlanType::PosLoss);
            }
            other => panic!("expected placed, got {other:?}"),
        }
        let placed = gateway.tpsl_orders_placed();
        assert_eq!(placed.len(), 1);
        assert!(placed[0].size.is_none());
    }

    #[tokio::test]
    async fn test_stop_loss_percent_short() {
        let (_, manager) = setup();

        // entry 42000, 10% adverse for a short -> 46200
        let outcome = manager
            .set_stop_loss_percent(
                symbol(),
                HoldSide::Short,
                Price::new(dec!(42000)),
                dec!(0.10),
                None,
            )
            .await
            .unwrap();
        match outcome {
            TpslOutcome::Placed { trigger_price, .. } => {
                assert_eq!(trigger_price, Price::new(dec!(46200)));
            }
            other => panic!("expected placed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_loss_with_size_is_partial_plan() {
        let (gateway, manager) = setup();

        manager
            .set_stop_loss_fixed(
                symbol(),
                HoldSide::Long,
                Price::new(dec!(37800)),
                Some(Size::new(dec!(0.5))),
            )
            .await
            .unwrap();
        let placed = gateway.tpsl_orders_placed();
        assert_eq!(placed[0].plan_type, PlanType::LossPlan);
        assert_eq!(placed[0].size, Some(Size::new(dec!(0.5))));
    }

    #[tokio::test]
    async fn test_stop_loss_wrong_side_rejected_long() {
        let (gateway, manager) = setup();

        let spec = StopLossSpec::new(
            symbol(),
            HoldSide::Long,
            StopRef::Price(Price::new(dec!(43000))),
        )
        .with_entry_price(Price::new(dec!(42000)));

        let err = manager.set_stop_loss(spec).await.unwrap_err();
        assert!(matches!(err, PositionError::Validation(_)));
        assert!(gateway.tpsl_orders_placed().is_empty());
    }

    #[tokio::test]
    async fn test_stop_loss_wrong_side_rejected_short() {
        let (gateway, manager) = setup();

        let spec = StopLossSpec::new(
            symbol(),
            HoldSide::Short,
            StopRef::Price(Price::new(dec!(41000))),
        )
        .with_entry_price(Price::new(dec!(42000)));

        let err = manager.set_stop_loss(spec).await.unwrap_err();
        assert!(matches!(err, PositionError::Validation(_)));
        assert!(gateway.tpsl_orders_placed().is_empty());
    }

    #[tokio::test]
    async fn test_stop_loss_safety_rejection_submits_nothing() {
        let (gateway, manager) = setup_with_safety();
        gateway.set_ticker(Price::new(dec!(50000)));

        // 40% below the market: outside the allowed SL distance band.
        let outcome = manager
            .set_stop_loss_fixed(symbol(), HoldSide::Long, Price::new(dec!(30000)), None)
            .await
            .unwrap();
        match outcome {
            TpslOutcome::SafetyRejected(report) => {
                assert!(!report.errors.is_empty());
            }
            other => panic!("expected safety rejection, got {other:?}"),
        }
        assert!(gateway.tpsl_orders_placed().is_empty());
    }

    #[tokio::test]
    async fn test_take_profit_direction_invariants() {
        let (_, manager) = setup();

        // Long TP below entry: rejected.
        let spec = TakeProfitSpec::new(
            symbol(),
            HoldSide::Long,
            StopRef::Price(Price::new(dec!(41000))),
        )
        .with_entry_price(Price::new(dec!(42000)));
        assert!(manager.set_take_profit_futures(spec).await.is_err());

        // Short TP above entry: rejected.
        let spec = TakeProfitSpec::new(
            symbol(),
            HoldSide::Short,
            StopRef::Price(Price::new(dec!(43000))),
        )
        .with_entry_price(Price::new(dec!(42000)));
        assert!(manager.set_take_profit_futures(spec).await.is_err());
    }

    #[tokio::test]
    async fn test_take_profit_percent_plan_types() {
        let (gateway, manager) = setup();

        manager
            .set_take_profit_percent(
                symbol(),
                HoldSide::Long,
                Price::new(dec!(40000)),
                dec!(0.05),
                None,
            )
            .await
            .unwrap();
        manager
            .set_take_profit_percent(
                symbol(),
                HoldSide::Long,
                Price::new(dec!(40000)),
                dec!(0.05),
                Some(Size::new(dec!(0.1))),
            )
            .await
            .unwrap();

        let placed = gateway.tpsl_orders_placed();
        assert_eq!(placed[0].plan_type, PlanType::PosProfit);
        assert_eq!(placed[0].trigger_price, Price::new(dec!(42000)));
        assert_eq!(placed[1].plan_type, PlanType::ProfitPlan);
    }

    #[tokio::test]
    async fn test_trailing_stop_requires_size_and_range() {
        let (_, manager) = setup();

        let spec = TrailingStopSpec::new(
            symbol(),
            HoldSide::Long,
            Size::ZERO,
            dec!(0.05),
            Activation::Price(Price::new(dec!(45000))),
        );
        assert!(manager.set_trailing_stop(spec).await.is_err());

        let spec = TrailingStopSpec::new(
            symbol(),
            HoldSide::Long,
            Size::new(dec!(0.1)),
            dec!(1.5),
            Activation::Price(Price::new(dec!(45000))),
        );
        assert!(manager.set_trailing_stop(spec).await.is_err());
    }

    #[tokio::test]
    async fn test_trailing_stop_rounds_range_rate() {
        let (gateway, manager) = setup();

        let spec = TrailingStopSpec::new(
            symbol(),
            HoldSide::Long,
            Size::new(dec!(0.1)),
            dec!(0.057),
            Activation::Price(Price::new(dec!(45000))),
        );
        manager.set_trailing_stop(spec).await.unwrap();

        let placed = gateway.plan_orders_placed();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].0.plan_type, PlanType::MovingPlan);
        assert_eq!(placed[0].0.range_rate, Some(dec!(0.06)));
    }

    #[tokio::test]
    async fn test_trailing_activation_must_be_favorable() {
        let (_, manager) = setup();

        let spec = TrailingStopSpec::new(
            symbol(),
            HoldSide::Long,
            Size::new(dec!(0.1)),
            dec!(0.05),
            Activation::Price(Price::new(dec!(39000))),
        )
        .with_entry_price(Price::new(dec!(40000)));
        assert!(manager.set_trailing_stop(spec).await.is_err());

        let spec = TrailingStopSpec::new(
            symbol(),
            HoldSide::Long,
            Size::new(dec!(0.1)),
            dec!(0.05),
            Activation::ProfitPercent {
                percent: dec!(0.03),
                entry_price: Price::new(dec!(40000)),
            },
        );
        let outcome = manager.set_trailing_stop(spec).await.unwrap();
        match outcome {
            TpslOutcome::Placed { trigger_price, .. } => {
                assert_eq!(trigger_price, Price::new(dec!(41200)));
            }
            other => panic!("expected placed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pending_order_requires_execute_price_for_limit() {
        let (_, manager) = setup();

        let err = manager
            .set_pending_order(
                symbol(),
                HoldSide::Long,
                Size::new(dec!(0.1)),
                Price::new(dec!(48000)),
                OrderType::Limit,
                None,
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PositionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_pending_order_uses_normal_plan() {
        let (gateway, manager) = setup();

        let outcome = manager
            .set_pending_order(
                symbol(),
                HoldSide::Long,
                Size::new(dec!(0.1)),
                Price::new(dec!(48000)),
                OrderType::Market,
                None,
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();
        assert!(outcome.is_placed());

        let placed = gateway.plan_orders_placed();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].0.plan_type, PlanType::NormalPlan);
        assert_eq!(placed[0].0.size, Some(Size::new(dec!(0.1))));
    }

    #[tokio::test]
    async fn test_partial_tp_percent_sum_enforced() {
        let (gateway, manager) = setup();

        let targets = [
            PartialTarget {
                percent: dec!(0.5),
                price: Price::new(dec!(43000)),
            },
            PartialTarget {
                percent: dec!(0.3),
                price: Price::new(dec!(44000)),
            },
        ];
        let err = manager
            .set_partial_take_profit(
                &symbol(),
                HoldSide::Long,
                &targets,
                Size::new(dec!(1)),
                &ProductType::default(),
                &MarginCoin::default(),
                TriggerType::MarkPrice,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PositionError::Validation(_)));
        assert!(gateway.tpsl_orders_placed().is_empty());
    }

    #[tokio::test]
    async fn test_partial_tp_places_one_order_per_target() {
        let (gateway, manager) = setup();

        let targets = [
            PartialTarget {
                percent: dec!(0.5),
                price: Price::new(dec!(43000)),
            },
            PartialTarget {
                percent: dec!(0.3),
                price: Price::new(dec!(44000)),
            },
            PartialTarget {
                percent: dec!(0.2),
                price: Price::new(dec!(45500)),
            },
        ];
        let report = manager
            .set_partial_take_profit(
                &symbol(),
                HoldSide::Long,
                &targets,
                Size::new(dec!(1)),
                &ProductType::default(),
                &MarginCoin::default(),
                TriggerType::MarkPrice,
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.placed, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.results.len(), 3);
        for (i, result) in report.results.iter().enumerate() {
            assert_eq!(result.index, i);
            assert!(result.result.is_ok());
        }

        let placed = gateway.tpsl_orders_placed();
        assert_eq!(placed.len(), 3);
        assert_eq!(placed[0].size, Some(Size::new(dec!(0.5))));
        assert_eq!(placed[1].size, Some(Size::new(dec!(0.3))));
        assert_eq!(placed[2].size, Some(Size::new(dec!(0.2))));
        assert!(placed.iter().all(|p| p.plan_type == PlanType::ProfitPlan));
    }

    #[tokio::test]
    async fn test_partial_tp_failures_do_not_abort_ladder() {
        let (gateway, manager) = setup();
        gateway.fail_tpsl_with("rate limited");

        let targets = [
            PartialTarget {
                percent: dec!(0.6),
                price: Price::new(dec!(43000)),
            },
            PartialTarget {
                percent: dec!(0.4),
                price: Price::new(dec!(44000)),
            },
        ];
        let report = manager
            .set_partial_take_profit(
                &symbol(),
                HoldSide::Long,
                &targets,
                Size::new(dec!(1)),
                &ProductType::default(),
                &MarginCoin::default(),
                TriggerType::MarkPrice,
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.placed, 0);
        assert_eq!(report.failed, 2);
        assert!(report.results.iter().all(|r| r.result.is_err()));
    }

    #[tokio::test]
    async fn test_profit_based_tp_maps_levels_to_prices() {
        let (gateway, manager) = setup();

        let levels = [
            ProfitLevel {
                profit_percent: dec!(0.05),
                close_percent: dec!(0.5),
            },
            ProfitLevel {
                profit_percent: dec!(0.10),
                close_percent: dec!(0.5),
            },
        ];
        let report = manager
            .set_profit_based_take_profit(
                &symbol(),
                HoldSide::Long,
                Price::new(dec!(40000)),
                &levels,
                Size::new(dec!(1)),
                &ProductType::default(),
                &MarginCoin::default(),
            )
            .await
            .unwrap();
        assert_eq!(report.placed, 2);

        let placed = gateway.tpsl_orders_placed();
        assert_eq!(placed[0].trigger_price, Price::new(dec!(42000)));
        assert_eq!(placed[1].trigger_price, Price::new(dec!(44000)));
    }
}
