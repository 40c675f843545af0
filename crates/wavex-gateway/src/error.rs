//! Gateway error types.

use thiserror::Error;

/// Errors surfaced by an exchange gateway implementation.
///
/// The core never swallows these; they propagate to the per-cycle signal
/// handler, which logs and continues.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (connection, timeout, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The exchange answered with a business error code.
    #[error("Exchange API error {code}: {message}")]
    Api { code: String, message: String },

    /// A response arrived but a required field was absent.
    #[error("Missing data in exchange response: {0}")]
    MissingData(String),

    /// A response arrived but could not be decoded.
    #[error("Failed to decode exchange response: {0}")]
    Decode(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
