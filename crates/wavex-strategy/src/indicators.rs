//! EMA/RSI indicator computation over closed candles.
//!
//! The [`IndicatorService`] pulls candles from a [`CandleSource`]
//! collaborator and emits a snapshot only when a newer closed candle
//! appears, so one candle produces exactly one strategy evaluation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use wavex_core::{Price, Symbol};

use crate::error::StrategyResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time.
    pub ts: DateTime<Utc>,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Decimal,
}

/// Source of closed candles; implemented by the exchange feed outside
/// this workspace and by the paper-mode simulator.
pub trait CandleSource: Send + Sync {
    /// Closed candles for the symbol/timeframe, oldest first, at most
    /// `limit`.
    fn fetch_closed_candles(
        &self,
        symbol: Symbol,
        timeframe: String,
        limit: usize,
    ) -> BoxFuture<'_, StrategyResult<Vec<Candle>>>;
}

/// Indicator values for the latest closed candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: Price,
    pub ema: Decimal,
    pub rsi: Decimal,
}

/// Exponential moving average over closes, seeded with an SMA of the
/// first `len` values.
///
/// Returns None when there are fewer than `len` closes.
pub fn ema(closes: &[Decimal], len: usize) -> Option<Decimal> {
    if len == 0 || closes.len() < len {
        return None;
    }
    let len_dec = Decimal::from(len as u64);
    let seed: Decimal = closes[..len].iter().sum::<Decimal>() / len_dec;
    let alpha = Decimal::TWO / (len_dec + Decimal::ONE);

    let mut value = seed;
    for close in &closes[len..] {
        value = (*close - value) * alpha + value;
    }
    Some(value)
}

/// Relative strength index with Wilder smoothing.
///
/// Returns None when there are fewer than `len + 1` closes.
pub fn rsi(closes: &[Decimal], len: usize) -> Option<Decimal> {
    if len == 0 || closes.len() < len + 1 {
        return None;
    }
    let len_dec = Decimal::from(len as u64);

    let mut avg_gain = Decimal::ZERO;
    let mut avg_loss = Decimal::ZERO;
    for w in closes[..len + 1].windows(2) {
        let change = w[1] - w[0];
        if change > Decimal::ZERO {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= len_dec;
    avg_loss /= len_dec;

    // The tail starts at index `len` so the seam change (len -> len+1)
    // is included.
    for w in closes[len..].windows(2) {
        let change = w[1] - w[0];
        let (gain, loss) = if change > Decimal::ZERO {
            (change, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -change)
        };
        avg_gain = (avg_gain * (len_dec - Decimal::ONE) + gain) / len_dec;
        avg_loss = (avg_loss * (len_dec - Decimal::ONE) + loss) / len_dec;
    }

    if avg_loss.is_zero() {
        return Some(Decimal::from(100));
    }
    let rs = avg_gain / avg_loss;
    Some(Decimal::from(100) - Decimal::from(100) / (Decimal::ONE + rs))
}

/// Computes indicators from a candle source, deduplicating candles.
pub struct IndicatorService {
    candles: Arc<dyn CandleSource>,
    ema_len: usize,
    rsi_len: usize,
    last_candle_ts: Mutex<Option<DateTime<Utc>>>,
}

impl IndicatorService {
    pub fn new(candles: Arc<dyn CandleSource>, ema_len: usize, rsi_len: usize) -> Self {
        Self {
            candles,
            ema_len,
            rsi_len,
            last_candle_ts: Mutex::new(None),
        }
    }

    /// Indicators for the newest closed candle.
    ///
    /// Returns `Ok(None)` when no new candle has closed since the last
    /// call, or when history is still too short for the lookbacks.
    pub async fn get_indicators(
        &self,
        symbol: &Symbol,
        timeframe: &str,
    ) -> StrategyResult<Option<IndicatorSnapshot>> {
        // Enough history for the longer lookback, plus slack for gaps.
        let limit = self.ema_len.max(self.rsi_len + 1) + 50;
        let candles = self
            .candles
            .fetch_closed_candles(symbol.clone(), timeframe.to_string(), limit)
            .await?;

        let Some(last) = candles.last() else {
            return Ok(None);
        };

        {
            let mut last_ts = self.last_candle_ts.lock();
            if *last_ts == Some(last.ts) {
                debug!(symbol = %symbol, "No new closed candle");
                return Ok(None);
            }
            *last_ts = Some(last.ts);
        }

        let closes: Vec<Decimal> = candles.iter().map(|c| c.close.inner()).collect();
        let (Some(ema_value), Some(rsi_value)) = (
            ema(&closes, self.ema_len),
            rsi(&closes, self.rsi_len),
        ) else {
            debug!(
                symbol = %symbol,
                candles = closes.len(),
                "Not enough history for indicators"
            );
            return Ok(None);
        };

        Ok(Some(IndicatorSnapshot {
            price: last.close,
            ema: ema_value,
            rsi: rsi_value,
        }))
    }
}

impl std::fmt::Debug for IndicatorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorService")
            .field("ema_len", &self.ema_len)
            .field("rsi_len", &self.rsi_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ema_needs_enough_history() {
        assert!(ema(&[dec!(1), dec!(2)], 3).is_none());
        assert!(ema(&[dec!(1), dec!(2), dec!(3)], 3).is_some());
    }

    #[test]
    fn test_ema_of_constant_series() {
        let closes = vec![dec!(100); 20];
        assert_eq!(ema(&closes, 10), Some(dec!(100)));
    }

    #[test]
    fn test_ema_follows_trend() {
        let closes: Vec<Decimal> = (1..=20).map(Decimal::from).collect();
        let value = ema(&closes, 10).unwrap();
        // EMA lags the last value but sits above the plain SMA midpoint.
        assert!(value > dec!(10) && value < dec!(20));
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let closes: Vec<Decimal> = (1..=20).map(Decimal::from).collect();
        assert_eq!(rsi(&closes, 14), Some(dec!(100)));
    }

    #[test]
    fn test_rsi_all_losses_is_low() {
        let closes: Vec<Decimal> = (1..=20).rev().map(Decimal::from).collect();
        let value = rsi(&closes, 14).unwrap();
        assert!(value < dec!(1));
    }

    #[test]
    fn test_rsi_needs_enough_history() {
        let closes: Vec<Decimal> = (1..=14).map(Decimal::from).collect();
        assert!(rsi(&closes, 14).is_none());
    }

    struct FixedCandles(Vec<Candle>);

    impl CandleSource for FixedCandles {
        fn fetch_closed_candles(
            &self,
            _symbol: Symbol,
            _timeframe: String,
            _limit: usize,
        ) -> BoxFuture<'_, StrategyResult<Vec<Candle>>> {
            let candles = self.0.clone();
            Box::pin(async move { Ok(candles) })
        }
    }

    fn candle(i: i64, close: Decimal) -> Candle {
        Candle {
            ts: Utc.timestamp_opt(i * 3600, 0).unwrap(),
            open: Price::new(close),
            high: Price::new(close),
            low: Price::new(close),
            close: Price::new(close),
            volume: dec!(1),
        }
    }

    #[tokio::test]
    async fn test_service_emits_once_per_candle() {
        let candles: Vec<Candle> = (0..30).map(|i| candle(i, dec!(100))).collect();
        let service = IndicatorService::new(Arc::new(FixedCandles(candles)), 10, 5);
        let symbol = Symbol::new("BTCUSDT");

        let first = service.get_indicators(&symbol, "1H").await.unwrap();
        assert!(first.is_some());

        // Same newest candle: no second snapshot.
        let second = service.get_indicators(&symbol, "1H").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_service_short_history_yields_none() {
        let candles: Vec<Candle> = (0..3).map(|i| candle(i, dec!(100))).collect();
        let service = IndicatorService::new(Arc::new(FixedCandles(candles)), 10, 5);
        let symbol = Symbol::new("BTCUSDT");

        assert!(service
            .get_indicators(&symbol, "1H")
            .await
            .unwrap()
            .is_none());
    }
}
