use crate::domain::agent::{Agent, AgentId, AgentMetrics};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
            TradeAction::Hold => write!(f, "HOLD"),
        }
    }
}

impl FromStr for TradeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            "HOLD" => Ok(TradeAction::Hold),
            _ => anyhow::bail!("Invalid trade action: {}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Filled,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Filled => write!(f, "filled"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "filled" => Ok(ExecutionStatus::Filled),
            "failed" => Ok(ExecutionStatus::Failed),
            _ => anyhow::bail!("Invalid execution status: {}", s),
        }
    }
}

/// One simulated trade, or a recorded no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub agent_id: AgentId,
    pub action: TradeAction,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub realized_pnl: Decimal,
    pub status: ExecutionStatus,
    pub confidence: f64,
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    /// A non-executed decision kept for observability.
    pub fn hold(agent_id: AgentId, price: Decimal, confidence: f64, rationale: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            action: TradeAction::Hold,
            quantity: Decimal::ZERO,
            price,
            fees: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            status: ExecutionStatus::Filled,
            confidence,
            rationale,
            timestamp: Utc::now(),
        }
    }

    pub fn is_trade(&self) -> bool {
        self.action != TradeAction::Hold
    }
}

/// Append-only point-in-time copy of an agent's metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub id: Uuid,
    pub agent_id: AgentId,
    pub generation_index: u32,
    pub metrics: AgentMetrics,
    pub timestamp: DateTime<Utc>,
}

impl MetricSnapshot {
    pub fn capture(agent: &Agent) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent.id,
            generation_index: agent.generation_index,
            metrics: agent.metrics.clone(),
            timestamp: Utc::now(),
        }
    }
}
