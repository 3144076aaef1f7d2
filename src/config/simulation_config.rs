use super::{EnvSource, check_fraction};
use crate::domain::errors::ConfigError;
use anyhow::Result;

/// Parameters of the simulated market and execution venue.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Decisions must be strictly more confident than this to execute.
    pub confidence_gate: f64,
    pub failure_rate: f64,
    /// Upper bound of the uniform adverse slippage fraction.
    pub max_slippage_pct: f64,
    pub gas_fee_usd: f64,
    /// Per-step price shock bound of the random walk.
    pub price_volatility: f64,
    pub initial_capital_usd: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            confidence_gate: 0.6,
            failure_rate: 0.05,
            max_slippage_pct: 0.005,
            gas_fee_usd: 0.5,
            price_volatility: 0.02,
            initial_capital_usd: 10_000.0,
        }
    }
}

impl SimulationConfig {
    pub fn from_source(source: &EnvSource) -> Result<Self> {
        Ok(Self {
            confidence_gate: source.parse("CONFIDENCE_GATE", 0.6)?,
            failure_rate: source.parse("EXECUTION_FAILURE_RATE", 0.05)?,
            max_slippage_pct: source.parse("MAX_SLIPPAGE_PCT", 0.005)?, // 50bps
            gas_fee_usd: source.parse("GAS_FEE_USD", 0.5)?,
            price_volatility: source.parse("PRICE_VOLATILITY", 0.02)?,
            initial_capital_usd: source.parse("INITIAL_CAPITAL_USD", 10_000.0)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("CONFIDENCE_GATE", self.confidence_gate)?;
        check_fraction("EXECUTION_FAILURE_RATE", self.failure_rate)?;
        check_fraction("MAX_SLIPPAGE_PCT", self.max_slippage_pct)?;
        check_fraction("PRICE_VOLATILITY", self.price_volatility)?;
        if !self.gas_fee_usd.is_finite() || self.gas_fee_usd < 0.0 {
            return Err(ConfigError::Negative {
                key: "GAS_FEE_USD",
                value: self.gas_fee_usd,
            });
        }
        if !self.initial_capital_usd.is_finite() || self.initial_capital_usd <= 0.0 {
            return Err(ConfigError::NonPositive {
                key: "INITIAL_CAPITAL_USD",
            });
        }
        Ok(())
    }
}
