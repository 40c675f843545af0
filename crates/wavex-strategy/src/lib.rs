//! WAVEX strategy layer: state, signals, and the signal router.
//!
//! The strategy emits [`Signal`]s from indicator snapshots; the
//! [`SignalRouter`] turns them into position-manager calls and keeps
//! [`StrategyState`] consistent with what was actually executed.

pub mod error;
pub mod indicators;
pub mod router;
pub mod signal;
pub mod state;
pub mod wavex;

pub use error::{StrategyError, StrategyResult};
pub use indicators::{
    ema, rsi, BoxFuture, Candle, CandleSource, IndicatorService, IndicatorSnapshot,
};
pub use router::{RouterConfig, SignalRouter};
pub use signal::Signal;
pub use state::{AveragingLevel, StrategyState};
pub use wavex::{StrategyConfig, WavexStrategy};
