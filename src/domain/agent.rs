use crate::domain::dna::Dna;
use crate::domain::errors::StoreError;
use crate::domain::performance::{FitnessInputs, NEUTRAL_FITNESS, fitness};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type AgentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Paused,
    Eliminated,
    Error,
    Offline,
}

impl AgentStatus {
    /// Statuses the population manager scores and selects from.
    pub fn is_evolvable(&self) -> bool {
        matches!(self, AgentStatus::Running | AgentStatus::Paused)
    }

    /// Elimination is terminal; everything else may move between the
    /// scheduler-controlled states.
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        match (self, next) {
            (AgentStatus::Eliminated, AgentStatus::Eliminated) => true,
            (AgentStatus::Eliminated, _) => false,
            (current, AgentStatus::Eliminated) => current.is_evolvable(),
            _ => true,
        }
    }
}

impl FromStr for AgentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(AgentStatus::Running),
            "paused" => Ok(AgentStatus::Paused),
            "eliminated" => Ok(AgentStatus::Eliminated),
            "error" => Ok(AgentStatus::Error),
            "offline" => Ok(AgentStatus::Offline),
            _ => anyhow::bail!("Invalid agent status: {}", s),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Running => write!(f, "running"),
            AgentStatus::Paused => write!(f, "paused"),
            AgentStatus::Eliminated => write!(f, "eliminated"),
            AgentStatus::Error => write!(f, "error"),
            AgentStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Cumulative and period performance of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub total_profit: f64,
    pub total_trades: u64,
    pub profit_period: f64,
    pub trades_period: u64,
    /// Fraction in [0, 1].
    pub win_rate_period: f64,
    /// Largest single-trade loss magnitude seen this period.
    pub max_drawdown_period: f64,
    /// Score in [0, 100].
    pub fitness_score: f64,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            total_profit: 0.0,
            total_trades: 0,
            profit_period: 0.0,
            trades_period: 0,
            win_rate_period: 0.0,
            max_drawdown_period: 0.0,
            fitness_score: NEUTRAL_FITNESS,
        }
    }
}

impl AgentMetrics {
    /// Fold one filled trade's realized PnL into the running metrics and
    /// refresh the fitness score.
    pub fn record_trade(&mut self, pnl: f64) {
        self.total_profit += pnl;
        self.profit_period += pnl;
        self.total_trades += 1;
        self.trades_period += 1;

        let n = self.trades_period as f64;
        let is_win = if pnl > 0.0 { 1.0 } else { 0.0 };
        self.win_rate_period = ((self.win_rate_period * (n - 1.0) + is_win) / n).clamp(0.0, 1.0);

        if pnl < 0.0 {
            self.max_drawdown_period = self.max_drawdown_period.max(-pnl);
        }

        self.refresh_fitness();
    }

    pub fn fitness_inputs(&self) -> FitnessInputs {
        FitnessInputs {
            profit: self.profit_period,
            win_rate: self.win_rate_period,
            max_drawdown: self.max_drawdown_period,
            trade_count: self.trades_period,
        }
    }

    pub fn refresh_fitness(&mut self) -> f64 {
        self.fitness_score = fitness(&self.fitness_inputs());
        self.fitness_score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub dna: Dna,
    pub status: AgentStatus,
    pub generation_index: u32,
    /// Empty at genesis, two parents after breeding.
    pub parent_ids: Vec<AgentId>,
    pub metrics: AgentMetrics,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub eliminated_at: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(dna: Dna, generation_index: u32, parent_ids: Vec<AgentId>) -> Self {
        let id = Uuid::new_v4();
        let short = id.simple().to_string();
        Self {
            id,
            name: format!("{}-g{}-{}", dna.strategy_kind, generation_index, &short[..6]),
            dna,
            status: AgentStatus::Running,
            generation_index,
            parent_ids,
            metrics: AgentMetrics::default(),
            created_at: Utc::now(),
            last_heartbeat_at: None,
            eliminated_at: None,
        }
    }
}

/// Partial update applied by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentPatch {
    pub status: Option<AgentStatus>,
    pub generation_index: Option<u32>,
    pub metrics: Option<AgentMetrics>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub eliminated_at: Option<DateTime<Utc>>,
}

impl AgentPatch {
    pub fn status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn eliminated(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(AgentStatus::Eliminated),
            eliminated_at: Some(at),
            ..Self::default()
        }
    }

    pub fn heartbeat(at: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat_at: Some(at),
            ..Self::default()
        }
    }

    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_generation(mut self, generation_index: u32) -> Self {
        self.generation_index = Some(generation_index);
        self
    }

    /// Check the status rule before applying to `agent`.
    pub fn validate_for(&self, agent: &Agent) -> Result<(), StoreError> {
        match self.status {
            Some(next) if !agent.status.can_transition_to(next) => {
                if agent.status == AgentStatus::Eliminated {
                    Err(StoreError::EliminatedAgent(agent.id))
                } else {
                    Err(StoreError::InvalidTransition {
                        id: agent.id,
                        from: agent.status,
                        to: next,
                    })
                }
            }
            _ => Ok(()),
        }
    }

    pub fn apply(&self, agent: &mut Agent) {
        if let Some(status) = self.status {
            agent.status = status;
        }
        if let Some(generation_index) = self.generation_index {
            agent.generation_index = generation_index;
        }
        if let Some(metrics) = &self.metrics {
            agent.metrics = metrics.clone();
        }
        if let Some(at) = self.last_heartbeat_at {
            agent.last_heartbeat_at = Some(at);
        }
        if let Some(at) = self.eliminated_at {
            agent.eliminated_at = Some(at);
        }
    }
}

/// Query filter for listing agents. Empty `statuses` matches any status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentFilter {
    pub statuses: Vec<AgentStatus>,
    pub generation_index: Option<u32>,
}

impl AgentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn running() -> Self {
        Self {
            statuses: vec![AgentStatus::Running],
            generation_index: None,
        }
    }

    pub fn evolvable() -> Self {
        Self {
            statuses: vec![AgentStatus::Running, AgentStatus::Paused],
            generation_index: None,
        }
    }

    pub fn in_generation(mut self, index: u32) -> Self {
        self.generation_index = Some(index);
        self
    }

    pub fn matches(&self, agent: &Agent) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&agent.status))
            && self
                .generation_index
                .is_none_or(|index| agent.generation_index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_trade_incremental_win_rate() {
        let mut m = AgentMetrics::default();
        m.record_trade(10.0);
        m.record_trade(-4.0);
        m.record_trade(6.0);
        m.record_trade(-9.0);

        assert_eq!(m.trades_period, 4);
        assert_eq!(m.total_trades, 4);
        assert!((m.win_rate_period - 0.5).abs() < 1e-12);
        assert!((m.profit_period - 3.0).abs() < 1e-12);
        assert_eq!(m.max_drawdown_period, 9.0);
        assert_eq!(m.fitness_score, fitness(&m.fitness_inputs()));
    }

    #[test]
    fn test_status_transitions() {
        assert!(AgentStatus::Running.can_transition_to(AgentStatus::Paused));
        assert!(AgentStatus::Error.can_transition_to(AgentStatus::Running));
        assert!(AgentStatus::Paused.can_transition_to(AgentStatus::Eliminated));
        assert!(!AgentStatus::Error.can_transition_to(AgentStatus::Eliminated));
        assert!(!AgentStatus::Eliminated.can_transition_to(AgentStatus::Running));
        assert!(!AgentStatus::Eliminated.can_transition_to(AgentStatus::Paused));
    }

    #[test]
    fn test_filter_matches() {
        let mut agent = Agent::new(Dna::default(), 3, vec![]);
        assert!(AgentFilter::running().matches(&agent));
        assert!(AgentFilter::evolvable().in_generation(3).matches(&agent));
        assert!(!AgentFilter::evolvable().in_generation(4).matches(&agent));

        agent.status = AgentStatus::Error;
        assert!(!AgentFilter::running().matches(&agent));
        assert!(AgentFilter::all().matches(&agent));
    }

    #[test]
    fn test_patch_apply() {
        let mut agent = Agent::new(Dna::default(), 0, vec![]);
        let now = Utc::now();
        AgentPatch::eliminated(now).with_generation(2).apply(&mut agent);
        assert_eq!(agent.status, AgentStatus::Eliminated);
        assert_eq!(agent.eliminated_at, Some(now));
        assert_eq!(agent.generation_index, 2);
        assert!(agent.name.starts_with("momentum-g0-"));
    }

    #[test]
    fn test_patch_validation_keeps_eliminated_terminal() {
        let mut agent = Agent::new(Dna::default(), 0, vec![]);
        assert!(AgentPatch::status(AgentStatus::Paused).validate_for(&agent).is_ok());

        agent.status = AgentStatus::Eliminated;
        let err = AgentPatch::status(AgentStatus::Running)
            .validate_for(&agent)
            .unwrap_err();
        assert!(matches!(err, StoreError::EliminatedAgent(id) if id == agent.id));
        // Metric-only patches carry no status and pass.
        assert!(AgentPatch::heartbeat(Utc::now()).validate_for(&agent).is_ok());
    }
}
