//! In-Memory Store Implementation
//!
//! Thread-safe, in-memory implementation of [`AgentStore`].
//!
//! # Features
//!
//! - **Thread-safe**: one `Arc<RwLock>` guards the whole state, so
//!   `rotate_generation` is a single atomic step
//! - **Async**: all operations are async-ready
//! - **Testing**: used by unit tests, integration tests and the offline
//!   simulator
//!
//! # Limitations
//!
//! - Data is lost on restart; set `DATABASE_URL` for the SQLite store

use crate::domain::agent::{Agent, AgentFilter, AgentId, AgentPatch};
use crate::domain::errors::StoreError;
use crate::domain::events::SystemEvent;
use crate::domain::execution::{ExecutionRecord, MetricSnapshot};
use crate::domain::generation::{
    Generation, GenerationPatch, GenerationStats, GenerationStatus,
};
use crate::domain::repositories::AgentStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct StoreState {
    agents: Vec<Agent>,
    generations: Vec<Generation>,
    execution_records: Vec<ExecutionRecord>,
    metric_snapshots: Vec<MetricSnapshot>,
    system_events: Vec<SystemEvent>,
}

impl StoreState {
    fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent, StoreError> {
        self.agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::AgentNotFound(id))
    }

    fn generation_mut(&mut self, id: Uuid) -> Result<&mut Generation, StoreError> {
        self.generations
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(StoreError::GenerationNotFound(id))
    }

    fn ensure_no_active(&self) -> Result<(), StoreError> {
        match self
            .generations
            .iter()
            .find(|g| g.status == GenerationStatus::Active)
        {
            Some(active) => Err(StoreError::ActiveGenerationExists(active.index)),
            None => Ok(()),
        }
    }
}

/// In-memory implementation of AgentStore
#[derive(Clone, Default)]
pub struct InMemoryAgentStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>> {
        let state = self.state.read().await;
        Ok(state
            .agents
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>> {
        let state = self.state.read().await;
        Ok(state.agents.iter().find(|a| a.id == id).cloned())
    }

    async fn update_agent(&self, id: AgentId, patch: &AgentPatch) -> Result<Agent> {
        let mut state = self.state.write().await;
        let agent = state.agent_mut(id)?;
        patch.validate_for(agent)?;
        patch.apply(agent);
        Ok(agent.clone())
    }

    async fn insert_agents(&self, agents: Vec<Agent>) -> Result<Vec<Agent>> {
        let mut state = self.state.write().await;
        state.agents.extend(agents.iter().cloned());
        Ok(agents)
    }

    async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<()> {
        self.state
            .write()
            .await
            .execution_records
            .push(record.clone());
        Ok(())
    }

    async fn insert_metric_snapshot(&self, snapshot: &MetricSnapshot) -> Result<()> {
        self.state
            .write()
            .await
            .metric_snapshots
            .push(snapshot.clone());
        Ok(())
    }

    async fn get_active_generation(&self) -> Result<Option<Generation>> {
        let state = self.state.read().await;
        Ok(state
            .generations
            .iter()
            .find(|g| g.status == GenerationStatus::Active)
            .cloned())
    }

    async fn insert_generation(&self, generation: &Generation) -> Result<()> {
        let mut state = self.state.write().await;
        if generation.status == GenerationStatus::Active {
            state.ensure_no_active()?;
        }
        state.generations.push(generation.clone());
        Ok(())
    }

    async fn update_generation(&self, id: Uuid, patch: &GenerationPatch) -> Result<Generation> {
        let mut state = self.state.write().await;
        let generation = state.generation_mut(id)?;
        patch.apply(generation);
        Ok(generation.clone())
    }

    async fn insert_system_event(&self, event: &SystemEvent) -> Result<()> {
        self.state.write().await.system_events.push(event.clone());
        Ok(())
    }

    async fn rotate_generation(
        &self,
        old_id: Uuid,
        stats: GenerationStats,
        next: &Generation,
    ) -> Result<Generation> {
        let mut state = self.state.write().await;
        let old = state.generation_mut(old_id)?;
        let mut completed = old.clone();
        GenerationPatch::completed(stats, Utc::now()).apply(&mut completed);

        // Check against the post-rotation view before touching anything.
        if state.generations.iter().any(|g| {
            g.id != old_id && g.status == GenerationStatus::Active
        }) {
            return Err(StoreError::ActiveGenerationExists(next.index).into());
        }

        *state.generation_mut(old_id)? = completed.clone();
        state.generations.push(next.clone());
        Ok(completed)
    }

    async fn list_generations(&self) -> Result<Vec<Generation>> {
        let state = self.state.read().await;
        let mut generations = state.generations.clone();
        generations.sort_by_key(|g| g.index);
        Ok(generations)
    }

    async fn list_execution_records(&self, agent_id: AgentId) -> Result<Vec<ExecutionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .execution_records
            .iter()
            .filter(|r| r.agent_id == agent_id)
            .cloned()
            .collect())
    }

    async fn list_metric_snapshots(&self, agent_id: AgentId) -> Result<Vec<MetricSnapshot>> {
        let state = self.state.read().await;
        Ok(state
            .metric_snapshots
            .iter()
            .filter(|s| s.agent_id == agent_id)
            .cloned()
            .collect())
    }

    async fn list_system_events(&self) -> Result<Vec<SystemEvent>> {
        Ok(self.state.read().await.system_events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentStatus;
    use crate::domain::dna::Dna;
    use crate::domain::generation::EvolutionSnapshot;

    fn snapshot() -> EvolutionSnapshot {
        EvolutionSnapshot {
            mutation_rate: 0.15,
            elite_fraction: 0.2,
            elimination_fraction: 0.3,
            tournament_size: 2,
        }
    }

    fn stats() -> GenerationStats {
        GenerationStats {
            population_size: 0,
            average_fitness: 0.0,
            best_agent_id: None,
            best_fitness: 0.0,
            worst_agent_id: None,
            worst_fitness: 0.0,
            elites: 0,
            survivors: 0,
            eliminated: 0,
            offspring: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_and_filter_agents() {
        let store = InMemoryAgentStore::new();
        let a = Agent::new(Dna::default(), 0, vec![]);
        let b = Agent::new(Dna::default(), 0, vec![]);
        store.insert_agents(vec![a.clone(), b.clone()]).await.unwrap();

        store
            .update_agent(b.id, &AgentPatch::status(AgentStatus::Paused))
            .await
            .unwrap();

        let running = store.list_agents(&AgentFilter::running()).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, a.id);

        let all = store.list_agents(&AgentFilter::all()).await.unwrap();
        assert_eq!(all.iter().map(|x| x.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_update_unknown_agent_fails() {
        let store = InMemoryAgentStore::new();
        let err = store
            .update_agent(Uuid::new_v4(), &AgentPatch::status(AgentStatus::Paused))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::AgentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_eliminated_agent_cannot_be_reactivated() {
        let store = InMemoryAgentStore::new();
        let agent = Agent::new(Dna::default(), 0, vec![]);
        store.insert_agents(vec![agent.clone()]).await.unwrap();

        store
            .update_agent(agent.id, &AgentPatch::eliminated(Utc::now()))
            .await
            .unwrap();
        let err = store
            .update_agent(agent.id, &AgentPatch::status(AgentStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::EliminatedAgent(_))
        ));

        let stored = store.get_agent(agent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AgentStatus::Eliminated);
    }

    #[tokio::test]
    async fn test_single_active_generation() {
        let store = InMemoryAgentStore::new();
        let genesis = Generation::genesis(snapshot());
        store.insert_generation(&genesis).await.unwrap();

        let duplicate = Generation::genesis(snapshot());
        assert!(store.insert_generation(&duplicate).await.is_err());

        let next = genesis.successor(snapshot());
        let completed = store
            .rotate_generation(genesis.id, stats(), &next)
            .await
            .unwrap();
        assert_eq!(completed.status, GenerationStatus::Completed);
        assert!(completed.completed_at.is_some());

        let active = store.get_active_generation().await.unwrap().unwrap();
        assert_eq!(active.id, next.id);
        assert_eq!(active.index, 1);

        let all = store.list_generations().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            all.iter()
                .filter(|g| g.status == GenerationStatus::Active)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_rotate_unknown_generation_leaves_state_untouched() {
        let store = InMemoryAgentStore::new();
        let genesis = Generation::genesis(snapshot());
        store.insert_generation(&genesis).await.unwrap();

        let next = genesis.successor(snapshot());
        assert!(
            store
                .rotate_generation(Uuid::new_v4(), stats(), &next)
                .await
                .is_err()
        );
        let active = store.get_active_generation().await.unwrap().unwrap();
        assert_eq!(active.id, genesis.id);
    }
}
