use crate::config::SimulationConfig;
use crate::domain::agent::Agent;
use crate::domain::market::MarketState;
use crate::domain::ports::MarketDataProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use statrs::statistics::{Data, Distribution};
use std::collections::VecDeque;
use std::sync::Mutex;

const HISTORY_CAPACITY: usize = 256;
const WARMUP_STEPS: usize = 64;
const ZSCORE_LOOKBACK: usize = 20;

/// Geometric random walk standing in for a real price feed.
///
/// Every snapshot advances the walk one step, then derives the momentum and
/// z-score signals from the rolling history. Wallet balances are derived
/// from the agent's starting capital plus its realized profit.
pub struct RandomWalkMarketFeed {
    symbol: String,
    volatility: f64,
    initial_capital: f64,
    state: Mutex<FeedState>,
}

struct FeedState {
    history: VecDeque<f64>,
    rng: StdRng,
}

impl FeedState {
    fn step(&mut self, volatility: f64) -> f64 {
        let last = self.history.back().copied().unwrap_or(1.0);
        let shock = if volatility > 0.0 {
            self.rng.random_range(-volatility..=volatility)
        } else {
            0.0
        };
        let next = (last * (1.0 + shock)).max(f64::EPSILON);
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(next);
        next
    }
}

impl RandomWalkMarketFeed {
    pub fn new(
        symbol: impl Into<String>,
        start_price: f64,
        config: &SimulationConfig,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let mut state = FeedState {
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            rng,
        };
        state.history.push_back(start_price.max(f64::EPSILON));
        for _ in 0..WARMUP_STEPS {
            state.step(config.price_volatility);
        }

        Self {
            symbol: symbol.into(),
            volatility: config.price_volatility,
            initial_capital: config.initial_capital_usd,
            state: Mutex::new(state),
        }
    }

    /// Most recent simulated price.
    pub fn last_price(&self) -> Option<f64> {
        self.state.lock().ok()?.history.back().copied()
    }

    /// Rate of change over `window` steps squashed into (-1, 1). A move of
    /// one expected standard deviation maps to tanh(1).
    pub fn momentum(history: &VecDeque<f64>, window: usize, volatility: f64) -> f64 {
        let len = history.len();
        if window == 0 || len <= window {
            return 0.0;
        }
        let now = history[len - 1];
        let then = history[len - 1 - window];
        if then <= 0.0 {
            return 0.0;
        }
        let roc = (now - then) / then;
        let scale = volatility * (window as f64).sqrt();
        if scale <= 0.0 {
            return 0.0;
        }
        (roc / scale).tanh()
    }

    /// Distance of the latest price from the rolling mean in standard
    /// deviations. Zero when the window is short or flat.
    pub fn z_score(history: &VecDeque<f64>, lookback: usize) -> f64 {
        if history.len() < lookback || lookback < 2 {
            return 0.0;
        }
        let prices: Vec<f64> = history.iter().rev().take(lookback).copied().collect();
        let current = prices[0];
        let data = Data::new(prices);
        let (Some(mean), Some(std_dev)) = (data.mean(), data.std_dev()) else {
            return 0.0;
        };
        if std_dev == 0.0 || !std_dev.is_finite() {
            return 0.0;
        }
        (current - mean) / std_dev
    }
}

#[async_trait]
impl MarketDataProvider for RandomWalkMarketFeed {
    async fn snapshot(&self, agent: &Agent) -> Result<MarketState> {
        let (price, momentum, z_score) = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| anyhow::anyhow!("RandomWalkMarketFeed: state lock poisoned"))?;
            let price = state.step(self.volatility);
            let momentum =
                Self::momentum(&state.history, agent.dna.momentum_window_len(), self.volatility);
            let z_score = Self::z_score(&state.history, ZSCORE_LOOKBACK);
            (price, momentum, z_score)
        };

        let price = Decimal::from_f64(price)
            .context("Simulated price is not representable")?
            .round_dp(8);

        let equity = (self.initial_capital + agent.metrics.total_profit).max(0.0);
        let quote_balance = Decimal::from_f64(equity / 2.0)
            .unwrap_or(Decimal::ZERO)
            .round_dp(2);
        let base_balance = if price.is_zero() {
            Decimal::ZERO
        } else {
            (quote_balance / price).round_dp(8)
        };

        Ok(MarketState {
            symbol: self.symbol.clone(),
            price,
            momentum: if momentum.is_finite() { momentum } else { 0.0 },
            z_score: if z_score.is_finite() { z_score } else { 0.0 },
            base_balance,
            quote_balance,
            timestamp: Utc::now(),
        })
    }
}

impl std::fmt::Debug for RandomWalkMarketFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomWalkMarketFeed")
            .field("symbol", &self.symbol)
            .field("volatility", &self.volatility)
            .field("last_price", &self.last_price())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dna::Dna;

    fn history(prices: &[f64]) -> VecDeque<f64> {
        prices.iter().copied().collect()
    }

    #[test]
    fn test_momentum_sign_and_range() {
        let rising = history(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let falling = history(&[104.0, 103.0, 102.0, 101.0, 100.0]);

        let up = RandomWalkMarketFeed::momentum(&rising, 4, 0.02);
        let down = RandomWalkMarketFeed::momentum(&falling, 4, 0.02);
        assert!(up > 0.0 && up < 1.0);
        assert!(down < 0.0 && down > -1.0);
    }

    #[test]
    fn test_momentum_short_history_is_flat() {
        let h = history(&[100.0, 110.0]);
        assert_eq!(RandomWalkMarketFeed::momentum(&h, 5, 0.02), 0.0);
    }

    #[test]
    fn test_z_score() {
        let mut prices = vec![100.0; 19];
        prices.push(110.0);
        let z = RandomWalkMarketFeed::z_score(&history(&prices), 20);
        assert!(z > 4.0, "z = {}", z);

        let flat = history(&[100.0; 20]);
        assert_eq!(RandomWalkMarketFeed::z_score(&flat, 20), 0.0);
    }

    #[tokio::test]
    async fn test_snapshot_is_sane_and_seeded() {
        let config = SimulationConfig::default();
        let a = RandomWalkMarketFeed::new("ETH/USD", 2000.0, &config, Some(11));
        let b = RandomWalkMarketFeed::new("ETH/USD", 2000.0, &config, Some(11));
        let agent = Agent::new(Dna::default(), 0, vec![]);

        let sa = a.snapshot(&agent).await.unwrap();
        let sb = b.snapshot(&agent).await.unwrap();
        assert_eq!(sa.price, sb.price);
        assert!(sa.price > Decimal::ZERO);
        assert!(sa.momentum > -1.0 && sa.momentum < 1.0);
        assert_eq!(sa.quote_balance, Decimal::from(5000));
        assert!(sa.base_balance > Decimal::ZERO);
    }
}
