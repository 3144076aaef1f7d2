//! Population manager configuration.

use super::{EnvSource, check_fraction};
use crate::domain::errors::ConfigError;
use crate::domain::generation::EvolutionSnapshot;
use anyhow::Result;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    pub interval: Duration,
    pub mutation_rate: f64,
    pub elite_fraction: f64,
    pub elimination_fraction: f64,
    pub tournament_size: usize,
    /// Agents created at genesis when the store has no active generation.
    pub initial_population: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 3600),
            mutation_rate: 0.15,
            elite_fraction: 0.2,
            elimination_fraction: 0.3,
            tournament_size: 2,
            initial_population: 10,
        }
    }
}

impl EvolutionConfig {
    pub fn from_source(source: &EnvSource) -> Result<Self> {
        let hours: f64 = source.parse("EVOLUTION_INTERVAL_HOURS", 24.0)?;
        let interval = if hours.is_finite() && hours > 0.0 {
            Duration::try_from_secs_f64(hours * 3600.0).map_err(|_| ConfigError::OutOfRange {
                key: "EVOLUTION_INTERVAL_HOURS",
                value: hours,
            })?
        } else {
            Duration::ZERO
        };

        Ok(Self {
            interval,
            mutation_rate: source.parse("MUTATION_RATE", 0.15)?,
            elite_fraction: source.parse("ELITE_FRACTION", 0.2)?,
            elimination_fraction: source.parse("ELIMINATION_FRACTION", 0.3)?,
            tournament_size: source.parse("TOURNAMENT_SIZE", 2usize)?,
            initial_population: source.parse("INITIAL_POPULATION", 10usize)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::NonPositive {
                key: "EVOLUTION_INTERVAL_HOURS",
            });
        }
        check_fraction("MUTATION_RATE", self.mutation_rate)?;
        check_fraction("ELITE_FRACTION", self.elite_fraction)?;
        check_fraction("ELIMINATION_FRACTION", self.elimination_fraction)?;
        if self.elite_fraction + self.elimination_fraction > 1.0 {
            return Err(ConfigError::InconsistentFractions {
                elite: self.elite_fraction,
                elimination: self.elimination_fraction,
            });
        }
        if self.tournament_size == 0 {
            return Err(ConfigError::NonPositive {
                key: "TOURNAMENT_SIZE",
            });
        }
        if self.initial_population == 0 {
            return Err(ConfigError::NonPositive {
                key: "INITIAL_POPULATION",
            });
        }
        Ok(())
    }
}

impl From<&EvolutionConfig> for EvolutionSnapshot {
    fn from(config: &EvolutionConfig) -> Self {
        Self {
            mutation_rate: config.mutation_rate,
            elite_fraction: config.elite_fraction,
            elimination_fraction: config.elimination_fraction,
            tournament_size: config.tournament_size,
        }
    }
}
