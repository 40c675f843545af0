//! Risk error types.

use thiserror::Error;
use wavex_gateway::GatewayError;

#[derive(Debug, Error)]
pub enum RiskError {
    /// The exchange could not be queried; the check is inconclusive.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
