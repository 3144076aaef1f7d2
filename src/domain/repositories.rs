//! Repository Pattern Abstractions
//!
//! The evolution core talks to persistence exclusively through
//! [`AgentStore`]. Every agent update is an independent read-modify-write;
//! there are no cross-agent transactions.
//!
//! # Implementations
//!
//! - `InMemoryAgentStore`: `Arc<RwLock>` backed, used by tests and the
//!   offline simulator
//! - `SqliteAgentStore`: sqlx/SQLite backed, used by the server when
//!   `DATABASE_URL` is set
//!
//! # Example
//!
//! ```rust,no_run
//! use evotrade::domain::agent::AgentFilter;
//! use evotrade::domain::repositories::AgentStore;
//! use evotrade::infrastructure::InMemoryAgentStore;
//!
//! # async {
//! let store = InMemoryAgentStore::new();
//! let running = store.list_agents(&AgentFilter::running()).await?;
//! # anyhow::Ok(())
//! # };
//! ```

use crate::domain::agent::{Agent, AgentFilter, AgentId, AgentPatch};
use crate::domain::events::SystemEvent;
use crate::domain::execution::{ExecutionRecord, MetricSnapshot};
use crate::domain::generation::{Generation, GenerationPatch, GenerationStats};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

#[async_trait]
pub trait AgentStore: Send + Sync {
    /// List agents matching the filter, in insertion order.
    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>>;

    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>>;

    /// Apply a partial update and return the updated agent. Fails for
    /// unknown agents and for attempts to move an eliminated agent to any
    /// other status.
    async fn update_agent(&self, id: AgentId, patch: &AgentPatch) -> Result<Agent>;

    async fn insert_agents(&self, agents: Vec<Agent>) -> Result<Vec<Agent>>;

    async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<()>;

    async fn insert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<()>;

    async fn get_active_generation(&self) -> Result<Option<Generation>>;

    async fn insert_generation(&self, generation: &Generation) -> Result<()>;

    async fn update_generation(&self, id: Uuid, patch: &GenerationPatch) -> Result<Generation>;

    async fn insert_system_event(&self, event: &SystemEvent) -> Result<()>;

    /// Complete `old_id` and activate `next`. Implementations that can do so
    /// should make this a single step so that exactly one generation is
    /// active at any time.
    async fn rotate_generation(
        &self,
        old_id: Uuid,
        stats: GenerationStats,
        next: &Generation,
    ) -> Result<Generation> {
        let completed = self
            .update_generation(old_id, &GenerationPatch::completed(stats, Utc::now()))
            .await?;
        self.insert_generation(next).await?;
        Ok(completed)
    }

    /// All generations, ordered by index.
    async fn list_generations(&self) -> Result<Vec<Generation>>;

    /// Execution records of one agent, oldest first.
    async fn list_execution_records(&self, agent_id: AgentId) -> Result<Vec<ExecutionRecord>>;

    /// Metric snapshots of one agent, oldest first.
    async fn list_metric_snapshots(&self, agent_id: AgentId) -> Result<Vec<MetricSnapshot>>;

    async fn list_system_events(&self) -> Result<Vec<SystemEvent>>;
}
