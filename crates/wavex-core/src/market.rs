//! Market identifiers: symbol, market type, product type, margin settings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading pair symbol, e.g. "BTCUSDT".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the quote currency from the symbol.
    ///
    /// Balances are denominated in the quote currency, so sizing needs it.
    pub fn quote_currency(&self) -> Option<&str> {
        const KNOWN_QUOTES: [&str; 3] = ["USDT", "BTC", "ETH"];
        KNOWN_QUOTES
            .iter()
            .find(|q| self.0.ends_with(*q))
            .copied()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Market type: spot or futures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    Futures,
}

impl MarketType {
    pub fn is_futures(&self) -> bool {
        matches!(self, Self::Futures)
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spot => write!(f, "spot"),
            Self::Futures => write!(f, "futures"),
        }
    }
}

/// Exchange product type, e.g. "USDT-FUTURES".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductType(String);

impl ProductType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProductType {
    fn default() -> Self {
        Self("USDT-FUTURES".to_string())
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Margin settlement coin, e.g. "USDT".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarginCoin(String);

impl MarginCoin {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MarginCoin {
    fn default() -> Self {
        Self("USDT".to_string())
    }
}

impl fmt::Display for MarginCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarginCoin {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Futures margin mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    #[default]
    Crossed,
    Isolated,
}

impl fmt::Display for MarginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crossed => write!(f, "crossed"),
            Self::Isolated => write!(f, "isolated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_quote_currency() {
        assert_eq!(Symbol::new("BTCUSDT").quote_currency(), Some("USDT"));
        assert_eq!(Symbol::new("ETHBTC").quote_currency(), Some("BTC"));
        assert_eq!(Symbol::new("FOOBAR").quote_currency(), None);
    }

    #[test]
    fn test_product_type_default() {
        assert_eq!(ProductType::default().as_str(), "USDT-FUTURES");
    }

    #[test]
    fn test_market_type_display() {
        assert_eq!(MarketType::Spot.to_string(), "spot");
        assert_eq!(MarketType::Futures.to_string(), "futures");
    }
}
