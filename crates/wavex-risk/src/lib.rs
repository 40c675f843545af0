//! Risk validation for the WAVEX trading bot.
//!
//! Two layers gate every order:
//! - [`RiskManager`]: balance/size limits and the daily-loss kill switch,
//!   consulted before any position is opened
//! - [`SafetyValidator`]: secondary sanity checks on derivative-order
//!   prices and sizes against the live market
//!
//! The manager prefers blocking over trading when a check cannot be
//! completed.

pub mod error;
pub mod manager;
pub mod safety;

pub use error::{RiskError, RiskResult};
pub use manager::{RiskConfig, RiskManager};
pub use safety::{PriceKind, SafetyConfig, SafetyReport, SafetyValidator};
