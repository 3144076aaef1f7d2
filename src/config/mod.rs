//! Configuration module for evotrade.
//!
//! This module provides structured configuration loading from environment
//! variables, organized by concern: Scheduler, Evolution, Simulation and
//! Observability. Everything is parsed and validated once at startup; any
//! malformed or out-of-range value prevents the system from starting.

mod env_source;
mod evolution_config;
mod observability_config;
mod scheduler_config;
mod simulation_config;

pub use env_source::EnvSource;
pub use evolution_config::EvolutionConfig;
pub use observability_config::ObservabilityConfig;
pub use scheduler_config::SchedulerConfig;
pub use simulation_config::SimulationConfig;

use crate::domain::errors::ConfigError;
use anyhow::{Context, Result};

/// Main application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub evolution: EvolutionConfig,
    pub simulation: SimulationConfig,
    pub observability: ObservabilityConfig,
    /// SQLite URL. Unset means the in-memory store.
    pub database_url: Option<String>,
    /// Seeds every RNG in the system for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Load and validate configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource::process())
    }

    /// Load and validate configuration from an explicit variable source.
    pub fn from_source(source: &EnvSource) -> Result<Self> {
        let config = Self {
            scheduler: SchedulerConfig::from_source(source)
                .context("Failed to load scheduler config")?,
            evolution: EvolutionConfig::from_source(source)
                .context("Failed to load evolution config")?,
            simulation: SimulationConfig::from_source(source)
                .context("Failed to load simulation config")?,
            observability: ObservabilityConfig::from_source(source)
                .context("Failed to load observability config")?,
            database_url: source.var("DATABASE_URL"),
            rng_seed: source.parse_optional("RNG_SEED")?,
        };

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        self.evolution.validate()?;
        self.simulation.validate()?;
        self.observability.validate()
    }
}

pub(crate) fn check_fraction(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::FractionOutOfRange { key, value })
    }
}
