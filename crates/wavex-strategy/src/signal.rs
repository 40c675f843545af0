//! Strategy signals.

use serde::{Deserialize, Serialize};
use std::fmt;

use wavex_core::Price;

/// A discrete trading signal emitted by the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    /// Enter a long position at `price`.
    BuyX { price: Price },
    /// Add to the position at averaging level `index` (0-based).
    Averaging { index: usize, price: Price },
    /// Close the position at `price`.
    CloseX { price: Price },
}

impl Signal {
    pub fn price(&self) -> Price {
        match self {
            Self::BuyX { price } | Self::Averaging { price, .. } | Self::CloseX { price } => {
                *price
            }
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuyX { .. } => write!(f, "BUYX"),
            Self::Averaging { index, .. } => write!(f, "AVER{}", index + 1),
            Self::CloseX { .. } => write!(f, "CLOSEX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signal_display() {
        let price = Price::new(dec!(100));
        assert_eq!(Signal::BuyX { price }.to_string(), "BUYX");
        assert_eq!(Signal::Averaging { index: 0, price }.to_string(), "AVER1");
        assert_eq!(Signal::Averaging { index: 2, price }.to_string(), "AVER3");
        assert_eq!(Signal::CloseX { price }.to_string(), "CLOSEX");
    }
}
