use crate::domain::agent::{AgentId, AgentStatus};
use thiserror::Error;
use uuid::Uuid;

/// Startup configuration errors. Any of these prevents the system from
/// starting.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be within [0, 1], got {value}")]
    FractionOutOfRange { key: &'static str, value: f64 },

    #[error("{key} must be greater than zero")]
    NonPositive { key: &'static str },

    #[error("{key} must not be negative, got {value}")]
    Negative { key: &'static str, value: f64 },

    #[error("{key} is too large to represent as a duration, got {value}")]
    OutOfRange { key: &'static str, value: f64 },

    #[error(
        "ELITE_FRACTION ({elite}) + ELIMINATION_FRACTION ({elimination}) must not exceed 1.0"
    )]
    InconsistentFractions { elite: f64, elimination: f64 },
}

/// Errors raised by store implementations for domain rule violations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Generation not found: {0}")]
    GenerationNotFound(Uuid),

    #[error("Agent {0} is eliminated and cannot be re-activated")]
    EliminatedAgent(AgentId),

    #[error("Agent {id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        id: AgentId,
        from: AgentStatus,
        to: AgentStatus,
    },

    #[error("Generation {0} is already active")]
    ActiveGenerationExists(u32),
}

#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error("An evolution cycle is already in progress")]
    CycleInProgress,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
