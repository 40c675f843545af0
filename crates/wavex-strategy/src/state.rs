//! Strategy state: one instance per traded symbol/session.
//!
//! Invariant: `entry_price` is set iff `position_open`; every armed
//! averaging level has its absolute trigger set iff `position_open`.
//! State is mutated only through the signal router.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wavex_core::Price;

/// One dollar-cost-averaging level.
///
/// `percentage` is the adverse move (in percent of entry) that triggers
/// a buy-in; `level` is the absolute price derived from entry when the
/// position opens. `filled` flips true exactly once per open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragingLevel {
    pub percentage: Decimal,
    pub level: Option<Price>,
    pub filled: bool,
    pub enabled: bool,
}

impl AveragingLevel {
    pub fn new(percentage: Decimal) -> Self {
        Self {
            percentage,
            level: None,
            filled: false,
            enabled: true,
        }
    }

    pub fn disabled(percentage: Decimal) -> Self {
        Self {
            enabled: false,
            ..Self::new(percentage)
        }
    }

    /// True when this level can still trigger a buy-in.
    pub fn is_armed(&self) -> bool {
        self.enabled && !self.filled && self.level.is_some()
    }
}

/// Mutable strategy state for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    pub position_open: bool,
    pub entry_price: Option<Price>,
    pub averaging_levels: Vec<AveragingLevel>,
}

impl StrategyState {
    pub fn new(averaging_levels: Vec<AveragingLevel>) -> Self {
        Self {
            position_open: false,
            entry_price: None,
            averaging_levels,
        }
    }

    /// Record an opened position and arm every averaging level at
    /// `entry * (1 - pct/100)`.
    pub fn open_at(&mut self, entry_price: Price) {
        self.position_open = true;
        self.entry_price = Some(entry_price);
        for level in &mut self.averaging_levels {
            level.level =
                Some(entry_price * (Decimal::ONE - level.percentage / Decimal::from(100)));
            level.filled = false;
        }
    }

    /// Record a closed position and disarm every averaging level.
    pub fn reset(&mut self) {
        self.position_open = false;
        self.entry_price = None;
        for level in &mut self.averaging_levels {
            level.level = None;
            level.filled = false;
        }
    }

    /// Check the state invariant: entry and levels are set iff open.
    pub fn is_consistent(&self) -> bool {
        if self.position_open != self.entry_price.is_some() {
            return false;
        }
        self.averaging_levels
            .iter()
            .all(|l| l.level.is_some() == self.position_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn levels() -> Vec<AveragingLevel> {
        vec![
            AveragingLevel::new(dec!(4)),
            AveragingLevel::new(dec!(8)),
            AveragingLevel::new(dec!(12)),
        ]
    }

    #[test]
    fn test_open_arms_levels() {
        let mut state = StrategyState::new(levels());
        state.open_at(Price::new(dec!(100)));

        assert!(state.position_open);
        assert_eq!(state.entry_price, Some(Price::new(dec!(100))));
        let armed: Vec<_> = state
            .averaging_levels
            .iter()
            .map(|l| l.level.unwrap())
            .collect();
        assert_eq!(
            armed,
            vec![
                Price::new(dec!(96)),
                Price::new(dec!(92)),
                Price::new(dec!(88))
            ]
        );
        assert!(state.averaging_levels.iter().all(|l| !l.filled));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = StrategyState::new(levels());
        state.open_at(Price::new(dec!(100)));
        state.averaging_levels[0].filled = true;

        state.reset();
        assert!(!state.position_open);
        assert!(state.entry_price.is_none());
        assert!(state
            .averaging_levels
            .iter()
            .all(|l| l.level.is_none() && !l.filled));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_invariant_holds_across_reopen() {
        let mut state = StrategyState::new(levels());
        for entry in [dec!(100), dec!(200), dec!(50)] {
            state.open_at(Price::new(entry));
            assert!(state.is_consistent());
            state.reset();
            assert!(state.is_consistent());
        }
    }

    #[test]
    fn test_armed_levels() {
        let mut state = StrategyState::new(vec![
            AveragingLevel::new(dec!(4)),
            AveragingLevel::disabled(dec!(8)),
        ]);
        state.open_at(Price::new(dec!(100)));

        assert!(state.averaging_levels[0].is_armed());
        assert!(!state.averaging_levels[1].is_armed());

        state.averaging_levels[0].filled = true;
        assert!(!state.averaging_levels[0].is_armed());
    }
}
