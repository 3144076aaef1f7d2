//! Simulated trade execution.
//!
//! Turns a strategy decision into an execution record. No exchange or chain
//! is involved: slippage, fees, fill failures and the realized PnL are all
//! drawn from the configured distributions.

use crate::application::strategies::Decision;
use crate::config::SimulationConfig;
use crate::domain::agent::AgentId;
use crate::domain::execution::{ExecutionRecord, ExecutionStatus, TradeAction};
use crate::domain::market::MarketState;
use crate::infrastructure::simulation::slippage_model::{SlippageModel, VolatilitySlippage};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Hold, or a trade that did not clear the confidence gate. Recorded,
    /// but metrics are untouched.
    Skipped(ExecutionRecord),
    /// Trade failed (liquidity, revert). Recorded, metrics untouched.
    Failed(ExecutionRecord),
    /// Trade filled; `pnl` is folded into the agent's metrics.
    Filled { record: ExecutionRecord, pnl: f64 },
}

impl ExecutionOutcome {
    pub fn record(&self) -> &ExecutionRecord {
        match self {
            ExecutionOutcome::Skipped(record) | ExecutionOutcome::Failed(record) => record,
            ExecutionOutcome::Filled { record, .. } => record,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Skipped(_) => "skipped",
            ExecutionOutcome::Failed(_) => "failed",
            ExecutionOutcome::Filled { .. } => "filled",
        }
    }
}

pub struct SimulatedExecutor {
    slippage: Arc<dyn SlippageModel>,
    gas_fee: Decimal,
    failure_rate: f64,
    confidence_gate: f64,
    price_volatility: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(config: &SimulationConfig, seed: Option<u64>) -> Self {
        Self::with_slippage(
            config,
            Arc::new(VolatilitySlippage::new(config.max_slippage_pct)),
            seed,
        )
    }

    pub fn with_slippage(
        config: &SimulationConfig,
        slippage: Arc<dyn SlippageModel>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            slippage,
            gas_fee: Decimal::from_f64(config.gas_fee_usd).unwrap_or(Decimal::ZERO),
            failure_rate: config.failure_rate,
            confidence_gate: config.confidence_gate,
            price_volatility: config.price_volatility,
            rng: Mutex::new(rng),
        }
    }

    /// Execute `decision` for `agent_id` against `market`.
    pub fn execute(
        &self,
        agent_id: AgentId,
        decision: &Decision,
        market: &MarketState,
    ) -> ExecutionOutcome {
        if decision.action == TradeAction::Hold {
            return ExecutionOutcome::Skipped(ExecutionRecord::hold(
                agent_id,
                market.price,
                decision.confidence,
                decision.rationale.clone(),
            ));
        }

        if decision.confidence <= self.confidence_gate || decision.quantity <= Decimal::ZERO {
            return ExecutionOutcome::Skipped(ExecutionRecord::hold(
                agent_id,
                market.price,
                decision.confidence,
                format!(
                    "Not executed ({} conf {:.2}, qty {}): {}",
                    decision.action, decision.confidence, decision.quantity, decision.rationale
                ),
            ));
        }

        // Lock scope: no await while the RNG is held.
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut record = ExecutionRecord {
            id: Uuid::new_v4(),
            agent_id,
            action: decision.action,
            quantity: decision.quantity,
            price: market.price,
            fees: self.gas_fee,
            realized_pnl: Decimal::ZERO,
            status: ExecutionStatus::Failed,
            confidence: decision.confidence,
            rationale: decision.rationale.clone(),
            timestamp: Utc::now(),
        };

        if rng.random_bool(self.failure_rate.clamp(0.0, 1.0)) {
            record.rationale = format!("Execution reverted: {}", decision.rationale);
            return ExecutionOutcome::Failed(record);
        }

        let fill_price = self
            .slippage
            .execution_price(market.price, decision.action, &mut *rng);

        // Subsequent price move, nudged in the trade's favour by confidence.
        let noise = if self.price_volatility > 0.0 {
            rng.random_range(-self.price_volatility..=self.price_volatility)
        } else {
            0.0
        };
        let edge = (decision.confidence - 0.5) * self.price_volatility;
        let direction = match decision.action {
            TradeAction::Sell => -1.0,
            _ => 1.0,
        };
        let move_pct = direction * noise + edge;

        let notional = (decision.quantity * fill_price).to_f64().unwrap_or(0.0);
        let pnl = notional * move_pct - self.gas_fee.to_f64().unwrap_or(0.0);

        record.price = fill_price;
        record.realized_pnl = Decimal::from_f64(pnl).unwrap_or(Decimal::ZERO).round_dp(8);
        record.status = ExecutionStatus::Filled;

        ExecutionOutcome::Filled { record, pnl }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::simulation::slippage_model::ZeroSlippage;
    use rust_decimal_macros::dec;

    fn config(failure_rate: f64) -> SimulationConfig {
        SimulationConfig {
            failure_rate,
            ..SimulationConfig::default()
        }
    }

    fn market() -> MarketState {
        MarketState {
            symbol: "ETH/USD".to_string(),
            price: dec!(2000),
            momentum: 0.0,
            z_score: 0.0,
            base_balance: dec!(1),
            quote_balance: dec!(10000),
            timestamp: Utc::now(),
        }
    }

    fn buy(confidence: f64) -> Decision {
        Decision::buy(dec!(0.5), "test".to_string()).with_confidence(confidence)
    }

    #[test]
    fn test_hold_is_skipped() {
        let executor = SimulatedExecutor::new(&config(0.0), Some(1));
        let outcome = executor.execute(Uuid::new_v4(), &Decision::hold("flat".into()), &market());
        assert!(matches!(outcome, ExecutionOutcome::Skipped(_)));
        assert_eq!(outcome.record().action, TradeAction::Hold);
    }

    #[test]
    fn test_confidence_gate_is_strict() {
        let executor = SimulatedExecutor::new(&config(0.0), Some(1));
        let at_gate = executor.execute(Uuid::new_v4(), &buy(0.6), &market());
        assert!(matches!(at_gate, ExecutionOutcome::Skipped(_)));
        assert_eq!(at_gate.record().action, TradeAction::Hold);
        assert!(at_gate.record().rationale.starts_with("Not executed"));

        let above = executor.execute(Uuid::new_v4(), &buy(0.61), &market());
        assert!(matches!(above, ExecutionOutcome::Filled { .. }));
    }

    #[test]
    fn test_always_failing_execution() {
        let executor = SimulatedExecutor::new(&config(1.0), Some(1));
        let outcome = executor.execute(Uuid::new_v4(), &buy(0.9), &market());
        match outcome {
            ExecutionOutcome::Failed(record) => {
                assert_eq!(record.status, ExecutionStatus::Failed);
                assert_eq!(record.realized_pnl, Decimal::ZERO);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_rate_is_roughly_honoured() {
        let executor = SimulatedExecutor::new(&config(0.05), Some(99));
        let failures = (0..4000)
            .filter(|_| {
                matches!(
                    executor.execute(Uuid::new_v4(), &buy(0.9), &market()),
                    ExecutionOutcome::Failed(_)
                )
            })
            .count();
        let rate = failures as f64 / 4000.0;
        assert!(rate > 0.03 && rate < 0.07, "rate = {}", rate);
    }

    #[test]
    fn test_filled_pnl_without_noise() {
        let cfg = SimulationConfig {
            failure_rate: 0.0,
            price_volatility: 0.0,
            gas_fee_usd: 0.5,
            ..SimulationConfig::default()
        };
        let executor = SimulatedExecutor::with_slippage(&cfg, Arc::new(ZeroSlippage), Some(5));
        match executor.execute(Uuid::new_v4(), &buy(0.9), &market()) {
            ExecutionOutcome::Filled { record, pnl } => {
                assert_eq!(record.price, dec!(2000));
                assert_eq!(record.fees, dec!(0.5));
                // No price move: only the fee is lost.
                assert!((pnl + 0.5).abs() < 1e-9);
                assert_eq!(record.realized_pnl, dec!(-0.5));
            }
            other => panic!("expected fill, got {:?}", other),
        }
    }
}
