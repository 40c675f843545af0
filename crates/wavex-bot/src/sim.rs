//! Simulated candle feed for paper mode.
//!
//! A deterministic xorshift-driven random walk produces one new closed
//! candle per fetch, and the latest close is pushed into the paper
//! gateway so fills happen at the price the strategy saw.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

use wavex_core::{Price, Symbol};
use wavex_gateway::PaperGateway;
use wavex_strategy::{BoxFuture, Candle, CandleSource, StrategyResult};

/// Maximum per-candle move: ±0.5%.
const MAX_MOVE_PER_MILLE_X10: i64 = 500;

struct SimState {
    candles: Vec<Candle>,
    price: Decimal,
    seed: u64,
    next_ts: DateTime<Utc>,
}

/// Deterministic random-walk candle source.
pub struct SimCandleSource {
    state: Mutex<SimState>,
    step: ChronoDuration,
    max_history: usize,
}

impl SimCandleSource {
    pub fn new(initial_price: Decimal, step_secs: i64, seed: u64) -> Self {
        Self {
            state: Mutex::new(SimState {
                candles: Vec::new(),
                price: initial_price,
                // A zero seed would freeze the xorshift walk.
                seed: seed.max(1),
                next_ts: Utc::now(),
            }),
            step: ChronoDuration::seconds(step_secs),
            max_history: 500,
        }
    }

    fn xorshift(seed: &mut u64) -> u64 {
        let mut x = *seed;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *seed = x;
        x
    }

    /// Append one new closed candle to the walk.
    fn advance(state: &mut SimState, step: ChronoDuration, max_history: usize) {
        let roll = Self::xorshift(&mut state.seed);
        let per_mille_x10 =
            (roll % (2 * MAX_MOVE_PER_MILLE_X10 as u64 + 1)) as i64 - MAX_MOVE_PER_MILLE_X10;
        let change = Decimal::from(per_mille_x10) / Decimal::from(100_000);

        let open = state.price;
        let close = open * (Decimal::ONE + change);
        let (high, low) = if close >= open {
            (close, open)
        } else {
            (open, close)
        };

        state.candles.push(Candle {
            ts: state.next_ts,
            open: Price::new(open),
            high: Price::new(high),
            low: Price::new(low),
            close: Price::new(close),
            volume: Decimal::from(10),
        });
        state.price = close;
        state.next_ts += step;

        let overflow = state.candles.len().saturating_sub(max_history);
        if overflow > 0 {
            state.candles.drain(..overflow);
        }
    }
}

impl CandleSource for SimCandleSource {
    fn fetch_closed_candles(
        &self,
        _symbol: Symbol,
        _timeframe: String,
        limit: usize,
    ) -> BoxFuture<'_, StrategyResult<Vec<Candle>>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            // Backfill history on first use so the indicators have data.
            while state.candles.len() < limit {
                Self::advance(&mut state, self.step, self.max_history);
            }
            Self::advance(&mut state, self.step, self.max_history);

            let start = state.candles.len().saturating_sub(limit);
            Ok(state.candles[start..].to_vec())
        })
    }
}

/// Candle source that forwards closes into the paper gateway.
pub struct PaperFeed {
    inner: SimCandleSource,
    gateway: Arc<PaperGateway>,
}

impl PaperFeed {
    pub fn new(inner: SimCandleSource, gateway: Arc<PaperGateway>) -> Self {
        Self { inner, gateway }
    }
}

impl CandleSource for PaperFeed {
    fn fetch_closed_candles(
        &self,
        symbol: Symbol,
        timeframe: String,
        limit: usize,
    ) -> BoxFuture<'_, StrategyResult<Vec<Candle>>> {
        Box::pin(async move {
            let candles = self
                .inner
                .fetch_closed_candles(symbol, timeframe, limit)
                .await?;
            if let Some(last) = candles.last() {
                self.gateway.push_price(last.close);
            }
            Ok(candles)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_sim_walk_is_deterministic() {
        let a = SimCandleSource::new(dec!(50000), 60, 7);
        let b = SimCandleSource::new(dec!(50000), 60, 7);

        let ca = a
            .fetch_closed_candles(Symbol::new("BTCUSDT"), "1m".into(), 20)
            .await
            .unwrap();
        let cb = b
            .fetch_closed_candles(Symbol::new("BTCUSDT"), "1m".into(), 20)
            .await
            .unwrap();

        let closes_a: Vec<_> = ca.iter().map(|c| c.close).collect();
        let closes_b: Vec<_> = cb.iter().map(|c| c.close).collect();
        assert_eq!(closes_a, closes_b);
    }

    #[tokio::test]
    async fn test_sim_advances_per_fetch() {
        let source = SimCandleSource::new(dec!(50000), 60, 7);
        let symbol = Symbol::new("BTCUSDT");

        let first = source
            .fetch_closed_candles(symbol.clone(), "1m".into(), 5)
            .await
            .unwrap();
        let second = source
            .fetch_closed_candles(symbol, "1m".into(), 5)
            .await
            .unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 5);
        assert!(second.last().unwrap().ts > first.last().unwrap().ts);
    }

    #[tokio::test]
    async fn test_sim_moves_stay_bounded() {
        let source = SimCandleSource::new(dec!(50000), 60, 99);
        let candles = source
            .fetch_closed_candles(Symbol::new("BTCUSDT"), "1m".into(), 200)
            .await
            .unwrap();

        for candle in &candles {
            let change = (candle.close.inner() - candle.open.inner()).abs()
                / candle.open.inner();
            assert!(change <= dec!(0.005));
        }
    }
}
