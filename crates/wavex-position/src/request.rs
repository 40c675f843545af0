//! Request shapes for position operations.
//!
//! Sizing, closing, and leverage inputs are tagged enums rather than
//! string discriminators with optional fields, so "exactly one of" rules
//! hold by construction wherever the type system can carry them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wavex_core::{
    HoldSide, MarginCoin, MarginMode, MarketType, OrderSide, OrderType, Price, ProductType, Size,
    Symbol,
};
use wavex_gateway::LeverageMode;

/// How the position amount is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sizing {
    /// Spend a fixed quote-currency amount.
    Fixed(Decimal),
    /// Spend a fraction of the available balance (0, 1].
    BalancePercentage(Decimal),
}

/// A prospective position, built per `open_position` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub sizing: Sizing,
    pub order_type: OrderType,
    pub market_type: MarketType,
    /// Leverage to apply before sizing; zero leaves the current setting.
    pub leverage: Decimal,
    pub product_type: ProductType,
    pub margin_coin: MarginCoin,
    pub margin_mode: MarginMode,
}

impl PositionRequest {
    /// Market futures order with defaults matching the strategy flow.
    pub fn market_futures(symbol: Symbol, side: OrderSide, sizing: Sizing) -> Self {
        Self {
            symbol,
            side,
            sizing,
            order_type: OrderType::Market,
            market_type: MarketType::Futures,
            leverage: Decimal::ZERO,
            product_type: ProductType::default(),
            margin_coin: MarginCoin::default(),
            margin_mode: MarginMode::Crossed,
        }
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    pub fn with_margin_mode(mut self, margin_mode: MarginMode) -> Self {
        self.margin_mode = margin_mode;
        self
    }

    /// Check the sizing input before any network call.
    pub fn validate(&self) -> Result<(), String> {
        match self.sizing {
            Sizing::Fixed(amount) if amount <= Decimal::ZERO => {
                Err(format!("fixed amount must be positive (got {amount})"))
            }
            Sizing::BalancePercentage(pct)
                if pct <= Decimal::ZERO || pct > Decimal::ONE =>
            {
                Err(format!("balance percentage must be in (0, 1] (got {pct})"))
            }
            _ => Ok(()),
        }
    }
}

/// How much of a position to close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CloseSpec {
    /// Fraction of the current position size (0, 1].
    Percent(Decimal),
    /// Fixed quantity in the base currency.
    Fixed(Size),
}

/// Closing options shared by the close paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseOptions {
    pub product_type: ProductType,
    pub margin_coin: MarginCoin,
    pub order_type: OrderType,
    /// Limit price for limit closes.
    pub price: Option<Price>,
}

impl Default for CloseOptions {
    fn default() -> Self {
        Self {
            product_type: ProductType::default(),
            margin_coin: MarginCoin::default(),
            order_type: OrderType::Market,
            price: None,
        }
    }
}

/// Raw leverage inputs before mode resolution.
///
/// Exactly one mode may be expressed: uniform `leverage`, single-side
/// `leverage` + `side` (hedge mode), or explicit `long_leverage` +
/// `short_leverage`. Mixing modes is a validation error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LeverageUpdate {
    pub leverage: Option<Decimal>,
    pub side: Option<HoldSide>,
    pub long_leverage: Option<Decimal>,
    pub short_leverage: Option<Decimal>,
}

impl LeverageUpdate {
    pub fn uniform(leverage: Decimal) -> Self {
        Self {
            leverage: Some(leverage),
            ..Default::default()
        }
    }

    pub fn single_side(side: HoldSide, leverage: Decimal) -> Self {
        Self {
            leverage: Some(leverage),
            side: Some(side),
            ..Default::default()
        }
    }

    pub fn split(long_leverage: Decimal, short_leverage: Decimal) -> Self {
        Self {
            long_leverage: Some(long_leverage),
            short_leverage: Some(short_leverage),
            ..Default::default()
        }
    }

    /// Resolve into a single gateway mode, rejecting mixed inputs.
    pub fn resolve(&self) -> Result<LeverageMode, String> {
        let split_given = self.long_leverage.is_some() || self.short_leverage.is_some();

        match (self.leverage, self.side, split_given) {
            (Some(leverage), None, false) => {
                Self::check_positive(leverage)?;
                Ok(LeverageMode::Uniform(leverage))
            }
            (Some(leverage), Some(hold_side), false) => {
                Self::check_positive(leverage)?;
                Ok(LeverageMode::SingleSide { hold_side, leverage })
            }
            (None, None, true) => {
                let long_leverage = self
                    .long_leverage
                    .ok_or("long_leverage required with short_leverage")?;
                let short_leverage = self
                    .short_leverage
                    .ok_or("short_leverage required with long_leverage")?;
                Self::check_positive(long_leverage)?;
                Self::check_positive(short_leverage)?;
                Ok(LeverageMode::Split {
                    long_leverage,
                    short_leverage,
                })
            }
            (None, _, false) => Err("no leverage mode given".to_string()),
            _ => Err("leverage modes are mutually exclusive".to_string()),
        }
    }

    fn check_positive(leverage: Decimal) -> Result<(), String> {
        if leverage <= Decimal::ZERO {
            return Err(format!("leverage must be positive (got {leverage})"));
        }
        Ok(())
    }
}
