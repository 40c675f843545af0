//! Secondary sanity checks for derivative-order operations.
//!
//! Catches fat-fingered trigger prices and oversized orders before they
//! reach the exchange: a price cannot sit too far from the market, and a
//! closing order cannot exceed the position it closes. Violations abort
//! the whole operation; nothing is partially submitted.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use wavex_core::{HoldSide, MarketType, Price, ProductType, Size, Symbol};
use wavex_gateway::ExchangeGateway;

use crate::error::RiskResult;

/// What kind of price is being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceKind {
    StopLoss,
    TakeProfit,
    Limit,
    Trigger,
}

/// Distance bounds for safety validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Generic price deviation cap for limit/trigger prices.
    #[serde(default = "default_max_price_deviation")]
    pub max_price_deviation: Decimal,
    /// Stop-loss must sit at least this far from the market.
    #[serde(default = "default_min_sl_distance")]
    pub min_sl_distance: Decimal,
    /// Stop-loss must sit at most this far from the market.
    #[serde(default = "default_max_sl_distance")]
    pub max_sl_distance: Decimal,
    /// Take-profit further than this from the market only warns.
    #[serde(default = "default_max_tp_distance")]
    pub max_tp_distance: Decimal,
}

fn default_max_price_deviation() -> Decimal {
    Decimal::new(20, 2) // 20%
}

fn default_min_sl_distance() -> Decimal {
    Decimal::new(5, 3) // 0.5%
}

fn default_max_sl_distance() -> Decimal {
    Decimal::new(15, 2) // 15%
}

fn default_max_tp_distance() -> Decimal {
    Decimal::new(50, 2) // 50%
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_price_deviation: default_max_price_deviation(),
            min_sl_distance: default_min_sl_distance(),
            max_sl_distance: default_max_sl_distance(),
            max_tp_distance: default_max_tp_distance(),
        }
    }
}

/// Structured validation result.
///
/// `errors` abort the operation; `warnings` are logged and let it proceed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub current_price: Price,
    /// Relative distance of the checked price from the market.
    pub deviation: Decimal,
}

impl SafetyReport {
    fn from_parts(
        errors: Vec<String>,
        warnings: Vec<String>,
        current_price: Price,
        deviation: Decimal,
    ) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            current_price,
            deviation,
        }
    }

    fn merge(mut self, other: SafetyReport) -> Self {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
        self
    }
}

/// Validates derivative-order prices and sizes against the live market.
pub struct SafetyValidator {
    gateway: Arc<dyn ExchangeGateway>,
    config: SafetyConfig,
}

impl SafetyValidator {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, config: SafetyConfig) -> Self {
        Self { gateway, config }
    }

    /// Check a price against the current market.
    ///
    /// `current_price: None` fetches the ticker.
    pub async fn validate_price(
        &self,
        symbol: &Symbol,
        price: Price,
        kind: PriceKind,
        hold_side: Option<HoldSide>,
        current_price: Option<Price>,
    ) -> RiskResult<SafetyReport> {
        let current = match current_price {
            Some(p) => p,
            None => {
                self.gateway
                    .get_ticker_price(
                        symbol.clone(),
                        MarketType::Futures,
                        ProductType::default(),
                    )
                    .await?
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !price.is_positive() {
            errors.push(format!("price must be positive (got {price})"));
            return Ok(SafetyReport::from_parts(
                errors,
                warnings,
                current,
                Decimal::ZERO,
            ));
        }

        let deviation = (price.inner() - current.inner()).abs() / current.inner();

        match kind {
            PriceKind::StopLoss => {
                match hold_side {
                    Some(HoldSide::Long) if price >= current => errors.push(format!(
                        "stop-loss for long must be below the market: {price} >= {current}"
                    )),
                    Some(HoldSide::Short) if price <= current => errors.push(format!(
                        "stop-loss for short must be above the market: {price} <= {current}"
                    )),
                    _ => {}
                }
                if deviation > self.config.max_sl_distance {
                    errors.push(format!(
                        "stop-loss too far from the market: {deviation} > {}",
                        self.config.max_sl_distance
                    ));
                }
                if deviation < self.config.min_sl_distance {
                    warnings.push(format!(
                        "stop-loss very close to the market, immediate trigger risk: \
                         {deviation} < {}",
                        self.config.min_sl_distance
                    ));
                }
            }
            PriceKind::TakeProfit => {
                match hold_side {
                    Some(HoldSide::Long) if price <= current => warnings.push(format!(
                        "take-profit for long is usually above the market: {price} <= {current}"
                    )),
                    Some(HoldSide::Short) if price >= current => warnings.push(format!(
                        "take-profit for short is usually below the market: {price} >= {current}"
                    )),
                    _ => {}
                }
                if deviation > self.config.max_tp_distance {
                    warnings.push(format!(
                        "take-profit far from the market, may never fill: {deviation} > {}",
                        self.config.max_tp_distance
                    ));
                }
            }
            PriceKind::Limit | PriceKind::Trigger => {
                if deviation > self.config.max_price_deviation {
                    errors.push(format!(
                        "price too far from the market: {deviation} > {}",
                        self.config.max_price_deviation
                    ));
                }
            }
        }

        let report = SafetyReport::from_parts(errors, warnings, current, deviation);
        self.log_report(symbol, &report, "price");
        Ok(report)
    }

    /// Check an order size against the position it is meant to close.
    pub fn validate_order_size(
        &self,
        symbol: &Symbol,
        order_size: Size,
        position_size: Option<Size>,
        current_price: Price,
    ) -> SafetyReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !order_size.is_positive() {
            errors.push(format!("order size must be positive (got {order_size})"));
        } else if let Some(position_size) = position_size {
            let position_size = position_size.abs();
            if position_size.is_positive() {
                if order_size > position_size {
                    errors.push(format!(
                        "order size exceeds the position: {order_size} > {position_size}; \
                         would flip into an opposite position"
                    ));
                }
                // Heads-up when an order closes clearly less than the position.
                let coverage = order_size.inner() / position_size.inner();
                if coverage < Decimal::new(95, 2) {
                    warnings.push(format!(
                        "order closes only part of the position: {order_size} of {position_size}"
                    ));
                }
            }
        }

        let report = SafetyReport::from_parts(errors, warnings, current_price, Decimal::ZERO);
        self.log_report(symbol, &report, "size");
        report
    }

    /// Full stop-loss check: price against the market plus size against
    /// the position, and distance from entry when known.
    pub async fn validate_stop_loss_order(
        &self,
        symbol: &Symbol,
        stop_loss_price: Price,
        hold_side: HoldSide,
        position_size: Size,
        order_size: Option<Size>,
        entry_price: Option<Price>,
    ) -> RiskResult<SafetyReport> {
        let price_report = self
            .validate_price(symbol, stop_loss_price, PriceKind::StopLoss, Some(hold_side), None)
            .await?;
        let current = price_report.current_price;

        let order_size = order_size.unwrap_or(position_size);
        let size_report =
            self.validate_order_size(symbol, order_size, Some(position_size), current);

        let mut report = price_report.merge(size_report);

        if let Some(entry) = entry_price {
            if entry.is_positive() {
                let loss = match hold_side {
                    HoldSide::Long => (entry.inner() - stop_loss_price.inner()) / entry.inner(),
                    HoldSide::Short => (stop_loss_price.inner() - entry.inner()) / entry.inner(),
                };
                if loss > Decimal::new(20, 2) {
                    report.warnings.push(format!(
                        "stop-loss far from entry, {loss} potential loss"
                    ));
                }
                if loss < Decimal::ZERO {
                    report
                        .warnings
                        .push("stop-loss in the profit zone (break-even/trailing)".to_string());
                }
            }
        }

        report.valid = report.errors.is_empty();
        Ok(report)
    }

    fn log_report(&self, symbol: &Symbol, report: &SafetyReport, what: &str) {
        if !report.errors.is_empty() {
            error!(
                symbol = %symbol,
                errors = ?report.errors,
                "Safety {what} check failed"
            );
        } else if !report.warnings.is_empty() {
            warn!(
                symbol = %symbol,
                warnings = ?report.warnings,
                "Safety {what} check passed with warnings"
            );
        } else {
            debug!(symbol = %symbol, "Safety {what} check ok");
        }
    }
}
