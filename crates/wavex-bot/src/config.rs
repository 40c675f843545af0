//! Application configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use wavex_core::{MarginCoin, MarginMode, ProductType};
use wavex_position::BreakEvenConfig;
use wavex_risk::{RiskConfig, SafetyConfig};
use wavex_strategy::StrategyConfig;

use crate::error::{AppError, AppResult};

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    /// In-memory fills against a simulated feed; no exchange contact.
    #[default]
    Paper,
    /// Live trading through an exchange connector.
    Live,
}

/// One configured averaging level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AveragingLevelConfig {
    /// Drop from entry (in percent) that triggers the buy-in.
    pub percent: Decimal,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Session worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Override for the evaluation interval; None derives it from the
    /// timeframe (30s sub-hour, 60s otherwise).
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Bounded wait for the in-flight cycle when stopping.
    #[serde(default = "default_stop_join_timeout_secs")]
    pub stop_join_timeout_secs: u64,
}

fn default_stop_join_timeout_secs() -> u64 {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            stop_join_timeout_secs: default_stop_join_timeout_secs(),
        }
    }
}

/// Paper-mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSettings {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Decimal,
    #[serde(default = "default_initial_price")]
    pub initial_price: Decimal,
    /// Seed for the simulated price walk.
    #[serde(default = "default_sim_seed")]
    pub sim_seed: u64,
}

fn default_starting_balance() -> Decimal {
    Decimal::from(1000)
}

fn default_initial_price() -> Decimal {
    Decimal::from(50000)
}

fn default_sim_seed() -> u64 {
    42
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            initial_price: default_initial_price(),
            sim_seed: default_sim_seed(),
        }
    }
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// Fixed quote-currency amount per entry/averaging buy-in.
    #[serde(default = "default_amount")]
    pub amount: Decimal,
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
    #[serde(default)]
    pub mode: TradingMode,
    #[serde(default)]
    pub product_type: ProductType,
    #[serde(default)]
    pub margin_coin: MarginCoin,
    #[serde(default)]
    pub margin_mode: MarginMode,
    #[serde(default = "default_averaging")]
    pub averaging: Vec<AveragingLevelConfig>,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default = "default_true")]
    pub enable_safety_checks: bool,
    #[serde(default)]
    pub break_even: BreakEvenConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub paper: PaperSettings,
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_timeframe() -> String {
    "1H".to_string()
}

fn default_amount() -> Decimal {
    Decimal::from(100)
}

fn default_leverage() -> Decimal {
    Decimal::ONE
}

fn default_averaging() -> Vec<AveragingLevelConfig> {
    [4, 8, 12]
        .into_iter()
        .map(|percent| AveragingLevelConfig {
            percent: Decimal::from(percent),
            enabled: true,
        })
        .collect()
}

impl Default for BotConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config deserializes via defaults")
    }
}

impl BotConfig {
    /// Load from a file, falling back to defaults when it is absent.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Basic sanity checks before wiring anything.
    pub fn validate(&self) -> AppResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "amount must be positive (got {})",
                self.amount
            )));
        }
        if self.leverage <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "leverage must be positive (got {})",
                self.leverage
            )));
        }
        for level in &self.averaging {
            if level.percent <= Decimal::ZERO || level.percent >= Decimal::from(100) {
                return Err(AppError::Config(format!(
                    "averaging percent must be in (0, 100) (got {})",
                    level.percent
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.symbol, "BTCUSDT");
        assert_eq!(config.mode, TradingMode::Paper);
        assert_eq!(config.averaging.len(), 3);
        assert_eq!(config.averaging[0].percent, dec!(4));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: BotConfig = toml::from_str(
            r#"
            symbol = "ETHUSDT"
            timeframe = "15m"
            amount = 50
            leverage = 3

            [[averaging]]
            percent = 5

            [[averaging]]
            percent = 10
            enabled = false

            [risk]
            daily_loss_limit = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.symbol, "ETHUSDT");
        assert_eq!(config.averaging.len(), 2);
        assert!(!config.averaging[1].enabled);
        assert_eq!(config.risk.daily_loss_limit, dec!(25));
        // Untouched sections keep their defaults.
        assert_eq!(config.risk.max_position_size_ratio, dec!(0.2));
        assert_eq!(config.strategy.ema_len, 100);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BotConfig::default();
        config.amount = dec!(0);
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.averaging[0].percent = dec!(150);
        assert!(config.validate().is_err());
    }
}
