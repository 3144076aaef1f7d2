//! Observability configuration parsing.
//!
//! Controls the periodic JSON metrics reporter.

use super::EnvSource;
use crate::domain::errors::ConfigError;
use anyhow::Result;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_source(source: &EnvSource) -> Result<Self> {
        Ok(Self {
            enabled: source.parse("OBSERVABILITY_ENABLED", true)?,
            interval: Duration::from_secs(source.parse("OBSERVABILITY_INTERVAL", 60u64)?),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::NonPositive {
                key: "OBSERVABILITY_INTERVAL",
            });
        }
        Ok(())
    }
}
