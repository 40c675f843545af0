//! The trading session worker.
//!
//! One tokio task drives one signal-evaluation cycle per interval. The
//! gateway-call-then-state-mutation sequence is a unit: cancellation is
//! observed only between cycles, and `stop()` waits (bounded) for the
//! in-flight cycle to finish.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wavex_core::Symbol;
use wavex_strategy::{
    IndicatorService, Signal, SignalRouter, StrategyResult, StrategyState, WavexStrategy,
};

/// Evaluation interval for a timeframe: 30s for sub-hour timeframes,
/// 60s otherwise.
pub fn interval_for_timeframe(timeframe: &str) -> Duration {
    let sub_hour = timeframe
        .strip_suffix('m')
        .or_else(|| timeframe.strip_suffix("Min"))
        .and_then(|n| n.parse::<u64>().ok())
        .map(|minutes| minutes < 60)
        .unwrap_or(false);

    if sub_hour {
        Duration::from_secs(30)
    } else {
        Duration::from_secs(60)
    }
}

/// One full evaluation cycle: indicators, strategy, signal routing.
pub struct TradingCycle {
    indicator_service: IndicatorService,
    strategy: WavexStrategy,
    router: SignalRouter,
    state: StrategyState,
    symbol: Symbol,
    timeframe: String,
}

impl TradingCycle {
    pub fn new(
        indicator_service: IndicatorService,
        strategy: WavexStrategy,
        router: SignalRouter,
        state: StrategyState,
        symbol: Symbol,
        timeframe: String,
    ) -> Self {
        Self {
            indicator_service,
            strategy,
            router,
            state,
            symbol,
            timeframe,
        }
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    /// Run one cycle. Returns the executed signal, if any.
    pub async fn process(&mut self) -> StrategyResult<Option<Signal>> {
        let Some(snapshot) = self
            .indicator_service
            .get_indicators(&self.symbol, &self.timeframe)
            .await?
        else {
            debug!(symbol = %self.symbol, "No new candle");
            return Ok(None);
        };

        info!(
            symbol = %self.symbol,
            price = %snapshot.price,
            ema = %snapshot.ema,
            rsi = %snapshot.rsi,
            "Candle closed"
        );

        let Some(signal) =
            self.strategy
                .on_candle_close(snapshot.price, snapshot.ema, snapshot.rsi, &self.state)
        else {
            return Ok(None);
        };

        self.router.handle_signal(&mut self.state, signal).await?;
        Ok(Some(signal))
    }
}

/// Handle to a running session worker.
pub struct TradingSession {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl TradingSession {
    /// Spawn the worker.
    pub fn start(mut cycle: TradingCycle, interval: Duration, join_timeout: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_secs = interval.as_secs(), "Trading session started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if token.is_cancelled() {
                    break;
                }

                // Errors never kill the worker; the next cycle retries.
                match cycle.process().await {
                    Ok(Some(signal)) => info!(signal = %signal, "Cycle executed signal"),
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "Trading cycle error"),
                }
            }
            info!("Trading session stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
            join_timeout,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request shutdown and wait (bounded) for the in-flight cycle.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if tokio::time::timeout(self.join_timeout, handle).await.is_err() {
                warn!(
                    timeout_secs = self.join_timeout.as_secs(),
                    "Session worker did not stop within the join timeout"
                );
            }
        }
    }
}

impl Drop for TradingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
