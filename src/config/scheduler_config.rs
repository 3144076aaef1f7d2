//! Execution scheduler configuration.

use super::EnvSource;
use crate::domain::errors::ConfigError;
use anyhow::Result;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Wall-clock interval between ticks.
    pub poll_interval: Duration,
    /// Maximum number of agent cycles in flight at once.
    pub batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            batch_size: 10,
        }
    }
}

impl SchedulerConfig {
    pub fn from_source(source: &EnvSource) -> Result<Self> {
        Ok(Self {
            poll_interval: Duration::from_millis(source.parse("POLL_INTERVAL_MS", 5000u64)?),
            batch_size: source.parse("CONCURRENCY_BATCH_SIZE", 10usize)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::NonPositive {
                key: "POLL_INTERVAL_MS",
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::NonPositive {
                key: "CONCURRENCY_BATCH_SIZE",
            });
        }
        Ok(())
    }
}
