use crate::domain::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Active,
    Completed,
    Failed,
}

impl FromStr for GenerationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(GenerationStatus::Active),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            _ => anyhow::bail!("Invalid generation status: {}", s),
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStatus::Active => write!(f, "active"),
            GenerationStatus::Completed => write!(f, "completed"),
            GenerationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Evolution parameters in effect when a generation was created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionSnapshot {
    pub mutation_rate: f64,
    pub elite_fraction: f64,
    pub elimination_fraction: f64,
    pub tournament_size: usize,
}

/// Aggregates computed from the final scored set when a generation completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub population_size: usize,
    pub average_fitness: f64,
    pub best_agent_id: Option<AgentId>,
    pub best_fitness: f64,
    pub worst_agent_id: Option<AgentId>,
    pub worst_fitness: f64,
    pub elites: usize,
    pub survivors: usize,
    pub eliminated: usize,
    pub offspring: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub id: Uuid,
    pub index: u32,
    pub status: GenerationStatus,
    pub config: EvolutionSnapshot,
    pub stats: Option<GenerationStats>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Generation {
    pub fn genesis(config: EvolutionSnapshot) -> Self {
        Self::with_index(0, config)
    }

    /// The generation that replaces `self` once its evolution cycle runs.
    pub fn successor(&self, config: EvolutionSnapshot) -> Self {
        Self::with_index(self.index + 1, config)
    }

    fn with_index(index: u32, config: EvolutionSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            status: GenerationStatus::Active,
            config,
            stats: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationPatch {
    pub status: Option<GenerationStatus>,
    pub stats: Option<GenerationStats>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationPatch {
    pub fn completed(stats: GenerationStats, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(GenerationStatus::Completed),
            stats: Some(stats),
            completed_at: Some(at),
        }
    }

    pub fn apply(&self, generation: &mut Generation) {
        if let Some(status) = self.status {
            generation.status = status;
        }
        if let Some(stats) = &self.stats {
            generation.stats = Some(stats.clone());
        }
        if let Some(at) = self.completed_at {
            generation.completed_at = Some(at);
        }
    }
}
