//! Application wiring and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use wavex_core::{Price, Symbol};
use wavex_gateway::paper::PaperConfig as PaperGatewayConfig;
use wavex_gateway::{ExchangeGateway, PaperGateway};
use wavex_position::PositionManager;
use wavex_risk::{RiskManager, SafetyValidator};
use wavex_strategy::{
    AveragingLevel, IndicatorService, RouterConfig, SignalRouter, StrategyState, WavexStrategy,
};

use crate::config::{BotConfig, TradingMode};
use crate::error::{AppError, AppResult};
use crate::session::{interval_for_timeframe, TradingCycle, TradingSession};
use crate::sim::{PaperFeed, SimCandleSource};

/// The wired application.
pub struct Application {
    config: BotConfig,
}

impl Application {
    pub fn new(config: BotConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        let config = &self.config;

        // Paper mode keeps the concrete gateway handle so the sim feed
        // can push prices into it. The live REST/WS connector ships
        // separately and plugs in through the same gateway trait.
        let paper = match config.mode {
            TradingMode::Paper => Arc::new(PaperGateway::new(
                PaperGatewayConfig {
                    starting_balance: config.paper.starting_balance,
                    ..PaperGatewayConfig::default()
                },
                Price::new(config.paper.initial_price),
            )),
            TradingMode::Live => {
                return Err(AppError::Config(
                    "live mode requires an exchange connector; use mode = \"paper\""
                        .to_string(),
                ));
            }
        };
        let gateway: Arc<dyn ExchangeGateway> = paper.clone();

        let symbol = Symbol::new(config.symbol.clone());
        let risk = Arc::new(RiskManager::new(gateway.clone(), config.risk.clone()));
        let mut position_manager = PositionManager::new(gateway.clone(), risk);
        if config.enable_safety_checks {
            position_manager = position_manager
                .with_safety(SafetyValidator::new(gateway.clone(), config.safety.clone()));
        }
        let position_manager = Arc::new(position_manager);

        let router = SignalRouter::new(
            position_manager,
            RouterConfig {
                symbol: symbol.clone(),
                amount: config.amount,
                leverage: config.leverage,
                product_type: config.product_type.clone(),
                margin_coin: config.margin_coin.clone(),
                margin_mode: config.margin_mode,
            },
        );

        let state = StrategyState::new(
            config
                .averaging
                .iter()
                .map(|level| {
                    if level.enabled {
                        AveragingLevel::new(level.percent)
                    } else {
                        AveragingLevel::disabled(level.percent)
                    }
                })
                .collect(),
        );

        let interval = config
            .session
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| interval_for_timeframe(&config.timeframe));

        let sim = SimCandleSource::new(
            config.paper.initial_price,
            interval.as_secs() as i64,
            config.paper.sim_seed,
        );
        let candles = Arc::new(PaperFeed::new(sim, paper));

        let cycle = TradingCycle::new(
            IndicatorService::new(candles, config.strategy.ema_len, config.strategy.rsi_len),
            WavexStrategy::new(config.strategy.clone()),
            router,
            state,
            symbol.clone(),
            config.timeframe.clone(),
        );

        info!(
            symbol = %symbol,
            timeframe = %config.timeframe,
            amount = %config.amount,
            leverage = %config.leverage,
            mode = ?config.mode,
            "Starting trading session"
        );

        let mut session = TradingSession::start(
            cycle,
            interval,
            Duration::from_secs(config.session.stop_join_timeout_secs),
        );

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| AppError::Config(format!("signal handler failed: {e}")))?;
        info!("Shutdown requested");
        session.stop().await;
        Ok(())
    }
}
