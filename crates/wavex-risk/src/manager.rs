//! Position risk validation and the daily-loss kill switch.
//!
//! Every position-opening attempt passes through here. Business
//! rejections come back as `Ok(false)` so callers can degrade gracefully;
//! a gateway failure during a check propagates as an error and no order
//! is placed (fail-closed).

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use wavex_core::{MarginCoin, MarketType, OrderType, ProductType, Size, Symbol};
use wavex_gateway::{BusinessType, ExchangeGateway};

use crate::error::RiskResult;

/// Risk limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of the available balance a single position may consume.
    #[serde(default = "default_max_position_size_ratio")]
    pub max_position_size_ratio: Decimal,
    /// Daily realized-loss limit in the margin coin. Trading pauses for
    /// the rest of the UTC day once losses exceed it.
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit: Decimal,
    /// Page size for billing queries.
    #[serde(default = "default_bill_query_limit")]
    pub bill_query_limit: u32,
}

fn default_max_position_size_ratio() -> Decimal {
    Decimal::new(2, 1) // 0.2
}

fn default_daily_loss_limit() -> Decimal {
    Decimal::from(50)
}

fn default_bill_query_limit() -> u32 {
    100
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size_ratio: default_max_position_size_ratio(),
            daily_loss_limit: default_daily_loss_limit(),
            bill_query_limit: default_bill_query_limit(),
        }
    }
}

/// Gates every position-opening attempt.
pub struct RiskManager {
    gateway: Arc<dyn ExchangeGateway>,
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, config: RiskConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Whether trading is currently allowed under the daily loss limit.
    ///
    /// Sums realized PnL over `close_long`/`close_short` bills from UTC
    /// midnight to now. A gateway failure propagates; it is never mapped
    /// to "allowed".
    pub async fn is_trading_allowed(&self, product_type: &ProductType) -> RiskResult<bool> {
        let now = Utc::now();
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();

        let mut daily_pnl = Decimal::ZERO;
        for business_type in [BusinessType::CloseLong, BusinessType::CloseShort] {
            let bills = self
                .gateway
                .get_account_bills(
                    product_type.clone(),
                    business_type,
                    midnight,
                    now,
                    self.config.bill_query_limit,
                )
                .await?;
            daily_pnl += bills.iter().map(|b| b.amount).sum::<Decimal>();
        }

        let limit = -self.config.daily_loss_limit.abs();
        let allowed = daily_pnl >= limit;
        if !allowed {
            warn!(
                daily_pnl = %daily_pnl,
                limit = %limit,
                "Daily loss limit reached, trading paused until UTC midnight"
            );
        }
        Ok(allowed)
    }

    /// Whether the balance covers a position of `required_amount`.
    ///
    /// Rejects when the amount exceeds the configured fraction of the
    /// balance, then checks the leveraged amount plus commission against
    /// the full balance.
    pub async fn check_balance(
        &self,
        symbol: &Symbol,
        required_amount: Decimal,
        market_type: MarketType,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
        leverage: Decimal,
        order_type: OrderType,
    ) -> RiskResult<bool> {
        let available_balance = self
            .gateway
            .get_available_balance(
                symbol.clone(),
                market_type,
                product_type.clone(),
                margin_coin.clone(),
            )
            .await?;

        let max_position_size = available_balance * self.config.max_position_size_ratio;
        if required_amount > max_position_size {
            warn!(
                symbol = %symbol,
                required_amount = %required_amount,
                max_position_size = %max_position_size,
                "Position size limit exceeded"
            );
            return Ok(false);
        }

        let effective_amount = if market_type.is_futures() && leverage > Decimal::ZERO {
            required_amount * leverage
        } else {
            required_amount
        };
        let commission_rate = self
            .gateway
            .get_commission_rate(market_type, order_type)
            .await?;
        let total_required = effective_amount + effective_amount * commission_rate;

        debug!(
            symbol = %symbol,
            market_type = %market_type,
            available = %available_balance,
            total_required = %total_required,
            "Balance check"
        );

        Ok(available_balance >= total_required)
    }

    /// Validate a prospective position.
    ///
    /// Returns `Ok(false)` for business rejections (insufficient funds,
    /// non-positive quantity) rather than an error, so the caller can turn
    /// it into a skipped outcome. Gateway failures still propagate.
    #[allow(clippy::too_many_arguments)]
    pub async fn validate_position(
        &self,
        symbol: &Symbol,
        required_amount: Decimal,
        quantity: Size,
        market_type: MarketType,
        product_type: &ProductType,
        margin_coin: &MarginCoin,
        leverage: Decimal,
        order_type: OrderType,
    ) -> RiskResult<bool> {
        if !quantity.is_positive() {
            warn!(symbol = %symbol, quantity = %quantity, "Rejected: non-positive quantity");
            return Ok(false);
        }
        if !self
            .check_balance(
                symbol,
                required_amount,
                market_type,
                product_type,
                margin_coin,
                leverage,
                order_type,
            )
            .await?
        {
            warn!(symbol = %symbol, required_amount = %required_amount, "Rejected: balance check failed");
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use wavex_core::Price;
    use wavex_gateway::{BillRecord, MockExchangeGateway};

    fn manager_with(gateway: Arc<MockExchangeGateway>) -> RiskManager {
        RiskManager::new(gateway, RiskConfig::default())
    }

    fn symbol() -> Symbol {
        Symbol::new("BTCUSDT")
    }

    #[tokio::test]
    async fn test_check_balance_rejects_over_ratio() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.set_balance(dec!(1000));
        let risk = manager_with(gateway);

        // Ratio 0.2 of 1000 = 200; 250 is over the cap.
        let ok = risk
            .check_balance(
                &symbol(),
                dec!(250),
                MarketType::Futures,
                &ProductType::default(),
                &MarginCoin::default(),
                dec!(1),
                OrderType::Market,
            )
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_check_balance_accepts_within_ratio() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.set_balance(dec!(1000));
        let risk = manager_with(gateway);

        let ok = risk
            .check_balance(
                &symbol(),
                dec!(150),
                MarketType::Futures,
                &ProductType::default(),
                &MarginCoin::default(),
                dec!(1),
                OrderType::Market,
            )
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn test_check_balance_leverage_and_commission() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.set_balance(dec!(1000));
        gateway.set_commission_rate(dec!(0.001));
        let risk = manager_with(gateway);

        // 150 * 10x = 1500 effective + 1.5 commission > 1000 balance.
        let ok = risk
            .check_balance(
                &symbol(),
                dec!(150),
                MarketType::Futures,
                &ProductType::default(),
                &MarginCoin::default(),
                dec!(10),
                OrderType::Market,
            )
            .await
            .unwrap();
        assert!(!ok);

        // Spot ignores leverage: 150 + 0.15 <= 1000.
        let ok = risk
            .check_balance(
                &symbol(),
                dec!(150),
                MarketType::Spot,
                &ProductType::default(),
                &MarginCoin::default(),
                dec!(10),
                OrderType::Market,
            )
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn test_validate_position_zero_quantity() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.set_balance(dec!(1000));
        let risk = manager_with(gateway);

        let ok = risk
            .validate_position(
                &symbol(),
                dec!(100),
                Size::ZERO,
                MarketType::Futures,
                &ProductType::default(),
                &MarginCoin::default(),
                dec!(1),
                OrderType::Market,
            )
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_validate_position_gateway_error_propagates() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.fail_balance_with("timeout");
        let risk = manager_with(gateway);

        let err = risk
            .validate_position(
                &symbol(),
                dec!(100),
                Size::new(dec!(0.01)),
                MarketType::Futures,
                &ProductType::default(),
                &MarginCoin::default(),
                dec!(1),
                OrderType::Market,
            )
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_trading_allowed_within_limit() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.set_bills(vec![BillRecord {
            business_type: BusinessType::CloseLong,
            amount: dec!(-30),
            ts: Utc::now() - Duration::seconds(5),
        }]);
        let risk = manager_with(gateway);

        // -30 >= -50
        assert!(risk
            .is_trading_allowed(&ProductType::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_trading_disallowed_past_limit() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.set_bills(vec![
            BillRecord {
                business_type: BusinessType::CloseLong,
                amount: dec!(-30),
                ts: Utc::now() - Duration::seconds(10),
            },
            BillRecord {
                business_type: BusinessType::CloseShort,
                amount: dec!(-25),
                ts: Utc::now() - Duration::seconds(5),
            },
        ]);
        let risk = manager_with(gateway);

        // -55 < -50
        assert!(!risk
            .is_trading_allowed(&ProductType::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_trading_allowed_fails_closed_on_gateway_error() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.fail_bills_with("billing endpoint down");
        let risk = manager_with(gateway);

        assert!(risk
            .is_trading_allowed(&ProductType::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_yesterdays_losses_do_not_count() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.set_bills(vec![BillRecord {
            business_type: BusinessType::CloseLong,
            amount: dec!(-500),
            ts: Utc::now() - Duration::days(2),
        }]);
        let risk = manager_with(gateway);

        assert!(risk
            .is_trading_allowed(&ProductType::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_validate_position_happy_path() {
        let gateway = Arc::new(MockExchangeGateway::new());
        gateway.set_balance(dec!(1000));
        gateway.set_ticker(Price::new(dec!(50000)));
        let risk = manager_with(gateway);

        let ok = risk
            .validate_position(
                &symbol(),
                dec!(150),
                Size::new(dec!(0.002)),
                MarketType::Futures,
                &ProductType::default(),
                &MarginCoin::default(),
                dec!(2),
                OrderType::Market,
            )
            .await
            .unwrap();
        assert!(ok);
    }
}
