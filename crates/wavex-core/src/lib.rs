//! Core domain types for the WAVEX trading bot.
//!
//! This crate provides fundamental types used throughout the trading system:
//! - `Price`, `Size`: precision-safe numeric types
//! - `Symbol`, `ProductType`, `MarginCoin`: market identifiers
//! - `OrderSide`, `HoldSide`, `PlanType`: trading enums
//! - `OpenOutcome`, `SkipReason`: tagged results for position opening

pub mod decimal;
pub mod error;
pub mod market;
pub mod order;
pub mod outcome;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use market::{MarginCoin, MarginMode, MarketType, ProductType, Symbol};
pub use order::{
    ClientOrderId, HoldSide, OrderSide, OrderType, PlanType, PositionAction, TriggerType,
};
pub use outcome::{OpenOutcome, OrderResult, SkipReason};
