//! The WAVEX entry/averaging/exit rule.
//!
//! Entry (BUYX) when price is under the EMA with RSI oversold and no
//! position is open; averaging buys as price crosses armed levels
//! downward; exit (CLOSEX) when price is over the EMA with RSI
//! overbought.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use wavex_core::Price;

use crate::signal::Signal;
use crate::state::StrategyState;

/// Strategy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// EMA lookback length.
    #[serde(default = "default_ema_len")]
    pub ema_len: usize,
    /// RSI lookback length.
    #[serde(default = "default_rsi_len")]
    pub rsi_len: usize,
    /// RSI level under which entries fire.
    #[serde(default = "default_rsi_stop")]
    pub rsi_stop: Decimal,
    /// RSI level over which exits fire.
    #[serde(default = "default_anti_rsi_stop")]
    pub anti_rsi_stop: Decimal,
}

fn default_ema_len() -> usize {
    100
}

fn default_rsi_len() -> usize {
    14
}

fn default_rsi_stop() -> Decimal {
    Decimal::from(20)
}

fn default_anti_rsi_stop() -> Decimal {
    Decimal::from(70)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            ema_len: default_ema_len(),
            rsi_len: default_rsi_len(),
            rsi_stop: default_rsi_stop(),
            anti_rsi_stop: default_anti_rsi_stop(),
        }
    }
}

/// The WAVEX rule evaluator. Stateless; all state lives in
/// [`StrategyState`].
#[derive(Debug, Clone)]
pub struct WavexStrategy {
    config: StrategyConfig,
}

impl WavexStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Evaluate one closed candle.
    pub fn on_candle_close(
        &self,
        price: Price,
        ema: Decimal,
        rsi: Decimal,
        state: &StrategyState,
    ) -> Option<Signal> {
        debug!(price = %price, ema = %ema, rsi = %rsi, "Evaluating candle");

        // Entry: only without a position.
        if !state.position_open
            && price.inner() < ema
            && rsi < self.config.rsi_stop
        {
            info!(price = %price, rsi = %rsi, "Signal: BUYX");
            return Some(Signal::BuyX { price });
        }

        // Averaging: first armed level the price has crossed downward.
        if state.position_open && state.entry_price.is_some() {
            for (index, level) in state.averaging_levels.iter().enumerate() {
                if let Some(trigger) = level.level {
                    if level.enabled && !level.filled && price <= trigger {
                        info!(price = %price, index, "Signal: AVER{}", index + 1);
                        return Some(Signal::Averaging { index, price });
                    }
                }
            }
        }

        // Exit: only with a position.
        if state.position_open
            && price.inner() > ema
            && rsi > self.config.anti_rsi_stop
        {
            info!(price = %price, rsi = %rsi, "Signal: CLOSEX");
            return Some(Signal::CloseX { price });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AveragingLevel;
    use rust_decimal_macros::dec;

    fn strategy() -> WavexStrategy {
        WavexStrategy::new(StrategyConfig::default())
    }

    fn state_with_levels() -> StrategyState {
        StrategyState::new(vec![
            AveragingLevel::new(dec!(4)),
            AveragingLevel::new(dec!(8)),
        ])
    }

    #[test]
    fn test_buyx_when_oversold_below_ema() {
        let state = state_with_levels();
        let signal = strategy().on_candle_close(
            Price::new(dec!(95)),
            dec!(100),
            dec!(15),
            &state,
        );
        assert_eq!(signal, Some(Signal::BuyX { price: Price::new(dec!(95)) }));
    }

    #[test]
    fn test_no_buyx_with_open_position() {
        let mut state = state_with_levels();
        state.open_at(Price::new(dec!(100)));
        let signal = strategy().on_candle_close(
            Price::new(dec!(95)),
            dec!(100),
            dec!(15),
            &state,
        );
        // 95 <= 96 (the 4% level): averaging wins, not a fresh entry.
        assert_eq!(
            signal,
            Some(Signal::Averaging {
                index: 0,
                price: Price::new(dec!(95))
            })
        );
    }

    #[test]
    fn test_averaging_skips_filled_levels() {
        let mut state = state_with_levels();
        state.open_at(Price::new(dec!(100)));
        state.averaging_levels[0].filled = true;

        let signal = strategy().on_candle_close(
            Price::new(dec!(91)),
            dec!(100),
            dec!(50),
            &state,
        );
        assert_eq!(
            signal,
            Some(Signal::Averaging {
                index: 1,
                price: Price::new(dec!(91))
            })
        );
    }

    #[test]
    fn test_closex_when_overbought_above_ema() {
        let mut state = state_with_levels();
        state.open_at(Price::new(dec!(100)));

        let signal = strategy().on_candle_close(
            Price::new(dec!(110)),
            dec!(105),
            dec!(75),
            &state,
        );
        assert_eq!(
            signal,
            Some(Signal::CloseX {
                price: Price::new(dec!(110))
            })
        );
    }

    #[test]
    fn test_no_signal_in_neutral_zone() {
        let state = state_with_levels();
        let signal = strategy().on_candle_close(
            Price::new(dec!(100)),
            dec!(100),
            dec!(50),
            &state,
        );
        assert_eq!(signal, None);
    }

    #[test]
    fn test_no_closex_without_position() {
        let state = state_with_levels();
        let signal = strategy().on_candle_close(
            Price::new(dec!(110)),
            dec!(105),
            dec!(75),
            &state,
        );
        assert_eq!(signal, None);
    }
}
