use crate::domain::execution::TradeAction;
use rand::{Rng, RngCore};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Trait defining a slippage simulation model.
pub trait SlippageModel: Send + Sync {
    /// Adverse price move as a fraction of the quoted price.
    fn slippage_fraction(&self, rng: &mut dyn RngCore) -> f64;

    /// Effective execution price after slippage. Buys fill higher, sells
    /// fill lower.
    fn execution_price(&self, price: Decimal, action: TradeAction, rng: &mut dyn RngCore) -> Decimal {
        let fraction = Decimal::from_f64(self.slippage_fraction(rng)).unwrap_or(Decimal::ZERO);
        let filled = match action {
            TradeAction::Buy => price * (Decimal::ONE + fraction),
            TradeAction::Sell => price * (Decimal::ONE - fraction),
            TradeAction::Hold => price,
        };
        filled.max(Decimal::ZERO).round_dp(8)
    }
}

/// Uniform slippage in `[0, max_fraction]`, always against the trader.
#[derive(Debug, Clone)]
pub struct VolatilitySlippage {
    max_fraction: f64,
}

impl VolatilitySlippage {
    pub fn new(max_fraction: f64) -> Self {
        Self {
            max_fraction: max_fraction.max(0.0),
        }
    }
}

impl SlippageModel for VolatilitySlippage {
    fn slippage_fraction(&self, rng: &mut dyn RngCore) -> f64 {
        if self.max_fraction == 0.0 {
            return 0.0;
        }
        rng.random_range(0.0..=self.max_fraction)
    }
}

/// No Slippage model (perfect execution).
pub struct ZeroSlippage;

impl SlippageModel for ZeroSlippage {
    fn slippage_fraction(&self, _rng: &mut dyn RngCore) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal_macros::dec;

    #[test]
    fn test_volatility_slippage_is_adverse_and_bounded() {
        let model = VolatilitySlippage::new(0.01); // 1% max
        let mut rng = StdRng::seed_from_u64(3);
        let price = dec!(100);

        for _ in 0..500 {
            let buy = model.execution_price(price, TradeAction::Buy, &mut rng);
            let sell = model.execution_price(price, TradeAction::Sell, &mut rng);
            assert!(buy >= price && buy <= dec!(101));
            assert!(sell <= price && sell >= dec!(99));
        }
    }

    #[test]
    fn test_zero_slippage() {
        let mut rng = StdRng::seed_from_u64(3);
        let price = dec!(42.5);
        assert_eq!(ZeroSlippage.execution_price(price, TradeAction::Buy, &mut rng), price);
        assert_eq!(ZeroSlippage.execution_price(price, TradeAction::Sell, &mut rng), price);
    }
}
