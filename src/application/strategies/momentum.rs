use super::traits::{
    Decision, DecisionStrategy, buy_quantity, excess_confidence, hold_confidence, sell_quantity,
};
use crate::domain::dna::{Dna, StrategyKind};
use crate::domain::market::MarketState;

/// Momentum Strategy
///
/// Follows the squashed rate of change supplied with the market snapshot.
/// The agent's `risk_tolerance` gene is the entry threshold:
/// - momentum > +threshold → Buy `position_size_percent` of the quote balance
/// - momentum < -threshold → Sell `position_size_percent` of the base balance
/// - otherwise Hold
#[derive(Debug, Clone, Default)]
pub struct MomentumStrategy;

impl DecisionStrategy for MomentumStrategy {
    fn decide(&self, market: &MarketState, dna: &Dna) -> Decision {
        let threshold = dna.risk_tolerance;
        let momentum = market.momentum;

        if momentum > threshold {
            return Decision::buy(
                buy_quantity(market, dna.position_size_percent),
                format!(
                    "Momentum: {:.3} above +{:.3} on {} @ {}",
                    momentum, threshold, market.symbol, market.price
                ),
            )
            .with_confidence(excess_confidence(momentum, threshold));
        }

        if momentum < -threshold {
            return Decision::sell(
                sell_quantity(market, dna.position_size_percent),
                format!(
                    "Momentum: {:.3} below -{:.3} on {} @ {}",
                    momentum, threshold, market.symbol, market.price
                ),
            )
            .with_confidence(excess_confidence(momentum, threshold));
        }

        Decision::hold(format!(
            "Momentum: {:.3} inside ±{:.3}, no trend",
            momentum, threshold
        ))
        .with_confidence(hold_confidence(momentum, threshold))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn name(&self) -> &str {
        "Momentum"
    }
}
