//! Domain events and system log entries.
//!
//! `DomainEvent`s are fanned out to external observers (dashboards,
//! websocket broadcasters) through the event bus. `SystemEvent`s are the
//! persisted operational log.

use crate::domain::agent::{Agent, AgentId};
use crate::domain::execution::ExecutionRecord;
use crate::domain::generation::Generation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "agent.updated")]
    AgentUpdated(Agent),
    #[serde(rename = "transaction.new")]
    TransactionNew(ExecutionRecord),
    #[serde(rename = "generation.completed")]
    GenerationCompleted {
        completed: Generation,
        next_index: u32,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::AgentUpdated(_) => "agent.updated",
            DomainEvent::TransactionNew(_) => "transaction.new",
            DomainEvent::GenerationCompleted { .. } => "generation.completed",
        }
    }
}

/// Receives every published domain event. Must not block.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &DomainEvent);
}

pub struct LoggingListener;

impl EventListener for LoggingListener {
    fn on_event(&self, event: &DomainEvent) {
        match event {
            DomainEvent::AgentUpdated(agent) => debug!(
                "Event[{}]: {} status={} fitness={:.2}",
                event.name(),
                agent.name,
                agent.status,
                agent.metrics.fitness_score
            ),
            DomainEvent::TransactionNew(record) => debug!(
                "Event[{}]: agent={} {} {} @ {} ({})",
                event.name(),
                record.agent_id,
                record.action,
                record.quantity,
                record.price,
                record.status
            ),
            DomainEvent::GenerationCompleted {
                completed,
                next_index,
            } => debug!(
                "Event[{}]: generation {} -> {}",
                event.name(),
                completed.index,
                next_index
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEventLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for SystemEventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemEventLevel::Info => write!(f, "info"),
            SystemEventLevel::Warning => write!(f, "warning"),
            SystemEventLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for SystemEventLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(SystemEventLevel::Info),
            "warning" => Ok(SystemEventLevel::Warning),
            "error" => Ok(SystemEventLevel::Error),
            _ => anyhow::bail!("Invalid system event level: {}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub id: Uuid,
    pub level: SystemEventLevel,
    pub source: String,
    pub message: String,
    pub agent_id: Option<AgentId>,
    pub timestamp: DateTime<Utc>,
}

impl SystemEvent {
    pub fn new(level: SystemEventLevel, source: &str, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            source: source.to_string(),
            message: message.into(),
            agent_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn info(source: &str, message: impl Into<String>) -> Self {
        Self::new(SystemEventLevel::Info, source, message)
    }

    pub fn warning(source: &str, message: impl Into<String>) -> Self {
        Self::new(SystemEventLevel::Warning, source, message)
    }

    pub fn error(source: &str, message: impl Into<String>) -> Self {
        Self::new(SystemEventLevel::Error, source, message)
    }

    pub fn for_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dna::Dna;

    #[test]
    fn test_event_wire_names() {
        let agent = Agent::new(Dna::default(), 0, vec![]);
        let json = serde_json::to_value(DomainEvent::AgentUpdated(agent)).unwrap();
        assert_eq!(json["type"], "agent.updated");
        assert_eq!(json["payload"]["status"], "running");
    }

    #[test]
    fn test_system_event_builder() {
        let id = Uuid::new_v4();
        let event = SystemEvent::error("scheduler", "cycle failed").for_agent(id);
        assert_eq!(event.level, SystemEventLevel::Error);
        assert_eq!(event.agent_id, Some(id));
        assert_eq!(event.level.to_string(), "error");
    }
}
