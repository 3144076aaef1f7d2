//! Fitness Evaluator
//!
//! Collapses an agent's period metrics into a single score in [0, 100].
//! Pure and deterministic: the scheduler (after each cycle) and the
//! population manager (before selection) must agree bit-for-bit.

use serde::{Deserialize, Serialize};

/// Profit that maps to tanh(1.0) ≈ 0.76 of the profit component.
pub const PROFIT_SCALE: f64 = 1000.0;
/// Drawdown at which the drawdown penalty saturates.
pub const DRAWDOWN_CAP: f64 = 50.0;
/// Trade count at which the activity measure saturates.
pub const TRADE_COUNT_CAP: f64 = 100.0;
/// The overtrading penalty applies only above this normalized trade count.
pub const OVERTRADING_GATE: f64 = 0.8;
/// Score given to agents with no history.
pub const NEUTRAL_FITNESS: f64 = 50.0;

const W_PROFIT: f64 = 0.4;
const W_CONSISTENCY: f64 = 0.3;
const W_WIN_RATE: f64 = 0.2;
const W_DRAWDOWN: f64 = 0.05;
const W_OVERTRADING: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessInputs {
    pub profit: f64,
    /// Fraction in [0, 1].
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub trade_count: u64,
}

/// Score a set of period metrics.
pub fn fitness(inputs: &FitnessInputs) -> f64 {
    let profit_norm = finite_or_zero(inputs.profit / PROFIT_SCALE).tanh();
    let win_rate = finite_or_zero(inputs.win_rate).clamp(0.0, 1.0);
    let drawdown_norm = (finite_or_zero(inputs.max_drawdown) / DRAWDOWN_CAP).clamp(0.0, 1.0);
    let trade_norm = (inputs.trade_count as f64 / TRADE_COUNT_CAP).clamp(0.0, 1.0);

    let overtrading_penalty = if trade_norm > OVERTRADING_GATE {
        trade_norm
    } else {
        0.0
    };

    let raw = W_PROFIT * profit_norm + W_CONSISTENCY * (profit_norm * win_rate)
        + W_WIN_RATE * win_rate
        - W_DRAWDOWN * drawdown_norm
        - W_OVERTRADING * overtrading_penalty;

    ((raw + 1.0) * 50.0).clamp(0.0, 100.0)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn inputs(profit: f64, win_rate: f64, max_drawdown: f64, trade_count: u64) -> FitnessInputs {
        FitnessInputs {
            profit,
            win_rate,
            max_drawdown,
            trade_count,
        }
    }

    #[test]
    fn test_reference_scenario() {
        // tanh(1) = 0.761594...
        // raw = 0.4*0.7616 + 0.3*0.7616*0.7 + 0.2*0.7 - 0.05*0.2 = 0.594572
        let score = fitness(&inputs(1000.0, 0.7, 10.0, 50));
        assert!((score - 79.7286).abs() < 0.01, "score = {}", score);
    }

    #[test]
    fn test_empty_history_is_neutral() {
        assert_eq!(fitness(&inputs(0.0, 0.0, 0.0, 0)), NEUTRAL_FITNESS);
    }

    #[test]
    fn test_overtrading_gate_is_a_step() {
        let at_gate = fitness(&inputs(0.0, 0.5, 0.0, 80));
        let below_gate = fitness(&inputs(0.0, 0.5, 0.0, 79));
        let above_gate = fitness(&inputs(0.0, 0.5, 0.0, 81));
        assert_eq!(at_gate, below_gate);
        // 0.05 * 0.81 * 50
        assert!((at_gate - above_gate - 2.025).abs() < 1e-9);
    }

    #[test]
    fn test_boundaries() {
        let best = fitness(&inputs(1e12, 1.0, 0.0, 10));
        let worst = fitness(&inputs(-1e12, 0.0, 1e6, 1_000_000));
        // Weights cap the reachable range at [25, 95].
        assert!((best - 95.0).abs() < 1e-9);
        assert!((worst - 25.0).abs() < 1e-9);
        let nan = fitness(&inputs(f64::NAN, f64::INFINITY, f64::NAN, 0));
        assert!((0.0..=100.0).contains(&nan));
    }

    #[test]
    fn test_random_inputs_stay_in_range_and_are_repeatable() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let i = inputs(
                rng.random_range(-1e5..1e5),
                rng.random_range(-0.5..1.5),
                rng.random_range(0.0..500.0),
                rng.random_range(0..500),
            );
            let a = fitness(&i);
            let b = fitness(&i);
            assert!((0.0..=100.0).contains(&a));
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
