//! Position error types.

use thiserror::Error;
use wavex_gateway::GatewayError;
use wavex_risk::RiskError;

#[derive(Debug, Error)]
pub enum PositionError {
    /// Bad input shape, direction, or precision. Raised synchronously
    /// before any network call; never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Exchange failure; propagates to the per-cycle handler.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Risk-layer infrastructure failure.
    #[error(transparent)]
    Risk(#[from] RiskError),
}

pub type PositionResult<T> = Result<T, PositionError>;
