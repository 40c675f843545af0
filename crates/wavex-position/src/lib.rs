//! Position lifecycle management for the WAVEX trading bot.
//!
//! [`PositionManager`] is the single entry point for every
//! position-affecting operation: opening, partial and full closes,
//! leverage changes, derivative orders (stop-loss, take-profit,
//! trailing-stop, partial take-profit ladders), the break-even
//! transition, and the emergency close-all path.
//!
//! Contract: never place an order that has not passed risk validation,
//! and never corrupt derivative-order state.

pub mod break_even;
pub mod error;
pub mod manager;
pub mod request;
pub mod tpsl;

pub use break_even::{BreakEvenAction, BreakEvenConfig, BreakEvenDetail, BreakEvenReport};
pub use error::{PositionError, PositionResult};
pub use manager::{CloseResult, EmergencyCloseReport, PositionManager};
pub use request::{CloseOptions, CloseSpec, LeverageUpdate, PositionRequest, Sizing};
pub use tpsl::{
    Activation, PartialTarget, PartialTpReport, ProfitLevel, StopLossSpec, StopRef,
    TakeProfitSpec, TargetResult, TpslOutcome, TrailingStopSpec,
};
