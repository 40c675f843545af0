//! Strategy error types.

use thiserror::Error;
use wavex_gateway::GatewayError;
use wavex_position::PositionError;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Indicator error: {0}")]
    Indicator(String),
}

pub type StrategyResult<T> = Result<T, StrategyError>;
