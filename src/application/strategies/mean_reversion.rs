use super::traits::{
    Decision, DecisionStrategy, buy_quantity, excess_confidence, hold_confidence, sell_quantity,
};
use crate::domain::dna::{Dna, StrategyKind};
use crate::domain::market::MarketState;

/// Z-Score Mean Reversion Strategy
///
/// Bets on the price returning to its rolling mean.
/// - Entry: z-score < -threshold (price stretched below mean) → Buy
/// - Exit: z-score > +threshold (stretched above mean) → Sell
///
/// The threshold is the agent's `mean_reversion_threshold` gene.
#[derive(Debug, Clone, Default)]
pub struct MeanReversionStrategy;

impl DecisionStrategy for MeanReversionStrategy {
    fn decide(&self, market: &MarketState, dna: &Dna) -> Decision {
        let threshold = dna.mean_reversion_threshold;
        let z = market.z_score;

        if z < -threshold {
            return Decision::buy(
                buy_quantity(market, dna.position_size_percent),
                format!(
                    "Z-Score MR: {} is {:.2} std devs below mean (threshold {:.2})",
                    market.price,
                    z.abs(),
                    threshold
                ),
            )
            .with_confidence(excess_confidence(z, threshold));
        }

        if z > threshold {
            return Decision::sell(
                sell_quantity(market, dna.position_size_percent),
                format!(
                    "Z-Score MR: {} is {:.2} std devs above mean (threshold {:.2})",
                    market.price, z, threshold
                ),
            )
            .with_confidence(excess_confidence(z, threshold));
        }

        Decision::hold(format!("Z-Score MR: Z={:.2} within ±{:.2}", z, threshold))
            .with_confidence(hold_confidence(z, threshold))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn name(&self) -> &str {
        "ZScoreMR"
    }
}
