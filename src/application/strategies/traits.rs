use crate::domain::dna::{Dna, StrategyKind};
use crate::domain::execution::TradeAction;
use crate::domain::market::MarketState;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Output of a decision strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: TradeAction,
    pub quantity: Decimal,
    /// In [0, 1].
    pub confidence: f64,
    pub rationale: String,
}

impl Decision {
    pub fn buy(quantity: Decimal, rationale: String) -> Self {
        Self {
            action: TradeAction::Buy,
            quantity,
            confidence: 0.5,
            rationale,
        }
    }

    pub fn sell(quantity: Decimal, rationale: String) -> Self {
        Self {
            action: TradeAction::Sell,
            quantity,
            confidence: 0.5,
            rationale,
        }
    }

    pub fn hold(rationale: String) -> Self {
        Self {
            action: TradeAction::Hold,
            quantity: Decimal::ZERO,
            confidence: 0.5,
            rationale,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

/// Produces a decision from a market snapshot and the agent's DNA.
/// Implementations are pure: no I/O, no randomness.
pub trait DecisionStrategy: Send + Sync {
    fn decide(&self, market: &MarketState, dna: &Dna) -> Decision;

    fn kind(&self) -> StrategyKind;

    fn name(&self) -> &str;
}

/// Confidence for a signal that cleared `threshold`: 0.5 at the threshold,
/// growing with the relative excess, capped at 0.95.
pub(crate) fn excess_confidence(signal: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 0.95;
    }
    let excess = (signal.abs() - threshold) / threshold;
    (0.5 + excess * 0.5).clamp(0.0, 0.95)
}

/// Confidence for a hold: how far inside the neutral band the signal sits.
pub(crate) fn hold_confidence(signal: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 0.0;
    }
    (1.0 - signal.abs() / threshold).clamp(0.0, 1.0)
}

/// Buy size: `percent` of the quote balance, converted to units at `price`.
pub(crate) fn buy_quantity(market: &MarketState, percent: f64) -> Decimal {
    if market.price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let fraction = Decimal::from_f64(percent / 100.0).unwrap_or(Decimal::ZERO);
    (market.quote_balance * fraction / market.price)
        .round_dp(8)
        .max(Decimal::ZERO)
}

/// Sell size: `percent` of the base balance.
pub(crate) fn sell_quantity(market: &MarketState, percent: f64) -> Decimal {
    let fraction = Decimal::from_f64(percent / 100.0).unwrap_or(Decimal::ZERO);
    (market.base_balance * fraction).round_dp(8).max(Decimal::ZERO)
}
