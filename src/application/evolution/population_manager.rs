//! Population Manager
//!
//! Runs the evolution cycle: score the evolvable population, keep the
//! elites, fill the remaining survivor slots by tournament, eliminate the
//! rest, rotate the generation and breed replacements.
//!
//! At most one cycle is in flight (`try_lock` single-flight guard), and a
//! cycle holds the write side of the population gate so no scheduler tick
//! can write agent metrics while the population is being replaced.

use super::breeding::Breeder;
use super::selection::{
    ScoredAgent, SurvivorSelection, TournamentSelector, fraction_count, rank_population,
    select_survivors,
};
use crate::application::PopulationGate;
use crate::config::EvolutionConfig;
use crate::domain::agent::{Agent, AgentFilter, AgentId, AgentPatch};
use crate::domain::dna::{Dna, StrategyKind};
use crate::domain::errors::EvolutionError;
use crate::domain::events::{DomainEvent, SystemEvent};
use crate::domain::generation::{EvolutionSnapshot, Generation, GenerationStats};
use crate::domain::repositories::AgentStore;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::observability::Metrics;
use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{error, info, warn};

const EVENT_SOURCE: &str = "population_manager";

/// Result of one evolution cycle. A no-op cycle has no generation indexes
/// and empty id lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvolutionOutcome {
    pub completed_generation: Option<u32>,
    pub new_generation: Option<u32>,
    pub population: usize,
    pub elites: Vec<AgentId>,
    /// Includes the elites.
    pub survivors: Vec<AgentId>,
    pub eliminated: Vec<AgentId>,
    pub offspring: Vec<AgentId>,
    pub average_fitness: f64,
}

impl EvolutionOutcome {
    pub fn is_noop(&self) -> bool {
        self.new_generation.is_none()
    }
}

/// Everything decided by a cycle before any store write happens.
#[derive(Debug, Clone)]
pub struct EvolutionPlan {
    pub ranked: Vec<ScoredAgent>,
    pub selection: SurvivorSelection,
    pub offspring: Vec<Agent>,
    pub stats: GenerationStats,
}

/// Score, select and breed `agents` into generation `next_index`.
///
/// `eliminateCount = floor(N * elimination_fraction)` (at least one agent
/// always survives), `eliteCount = floor(N * elite_fraction)` capped at the
/// survivor count, and one child is bred per eliminated agent.
pub fn plan_generation<R: Rng + ?Sized>(
    agents: Vec<Agent>,
    config: &EvolutionConfig,
    next_index: u32,
    rng: &mut R,
) -> EvolutionPlan {
    let ranked = rank_population(agents);
    let n = ranked.len();

    let eliminate_count = fraction_count(n, config.elimination_fraction).min(n.saturating_sub(1));
    let survivor_count = n - eliminate_count;
    let elite_count = fraction_count(n, config.elite_fraction).min(survivor_count);

    let selector = TournamentSelector::new(config.tournament_size);
    let selection = select_survivors(&ranked, elite_count, survivor_count, &selector, rng);

    let breeder = Breeder::new(config.mutation_rate, selector);
    let offspring = breeder.breed(
        &selection.survivors,
        selection.eliminated.len(),
        next_index,
        rng,
    );

    let average_fitness = if n == 0 {
        0.0
    } else {
        ranked.iter().map(|s| s.fitness).sum::<f64>() / n as f64
    };
    let stats = GenerationStats {
        population_size: n,
        average_fitness,
        best_agent_id: ranked.first().map(ScoredAgent::id),
        best_fitness: ranked.first().map(|s| s.fitness).unwrap_or(0.0),
        worst_agent_id: ranked.last().map(ScoredAgent::id),
        worst_fitness: ranked.last().map(|s| s.fitness).unwrap_or(0.0),
        elites: selection.elites.len(),
        survivors: selection.survivors.len(),
        eliminated: selection.eliminated.len(),
        offspring: offspring.len(),
    };

    EvolutionPlan {
        ranked,
        selection,
        offspring,
        stats,
    }
}

pub struct PopulationManager {
    store: Arc<dyn AgentStore>,
    event_bus: EventBus,
    config: EvolutionConfig,
    gate: PopulationGate,
    in_flight: tokio::sync::Mutex<()>,
    rng: Mutex<StdRng>,
    metrics: Option<Metrics>,
}

impl PopulationManager {
    pub fn new(
        store: Arc<dyn AgentStore>,
        event_bus: EventBus,
        config: EvolutionConfig,
        gate: PopulationGate,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            store,
            event_bus,
            config,
            gate,
            in_flight: tokio::sync::Mutex::new(()),
            rng: Mutex::new(rng),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    fn snapshot(&self) -> EvolutionSnapshot {
        EvolutionSnapshot::from(&self.config)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut rng)
    }

    /// Create generation 0 with `size` random agents, alternating strategy
    /// kinds. Does nothing and returns the active generation if one exists.
    pub async fn seed_population(&self, size: usize) -> Result<Generation> {
        let _cycle = self.in_flight.lock().await;
        let _gate = self.gate.write().await;

        if let Some(active) = self.store.get_active_generation().await? {
            info!(
                "PopulationManager: Generation {} already active, skipping genesis",
                active.index
            );
            return Ok(active);
        }

        let genesis = Generation::genesis(self.snapshot());
        let agents: Vec<Agent> = self.with_rng(|rng| {
            (0..size)
                .map(|i| {
                    let kind = StrategyKind::ALL[i % StrategyKind::ALL.len()];
                    Agent::new(Dna::random(kind, rng), genesis.index, Vec::new())
                })
                .collect()
        });

        self.store.insert_generation(&genesis).await?;
        let inserted = self.store.insert_agents(agents).await?;
        for agent in &inserted {
            self.event_bus
                .publish(DomainEvent::AgentUpdated(agent.clone()))
                .await;
        }

        self.store
            .insert_system_event(&SystemEvent::info(
                EVENT_SOURCE,
                format!("Genesis: generation 0 seeded with {} agents", inserted.len()),
            ))
            .await?;
        if let Some(metrics) = &self.metrics {
            metrics.generation_index.set(0.0);
        }

        info!(
            "PopulationManager: Seeded generation 0 with {} agents",
            inserted.len()
        );
        Ok(genesis)
    }

    /// Run one evolution cycle. Returns `CycleInProgress` immediately if
    /// another cycle holds the guard.
    pub async fn run_cycle(&self) -> Result<EvolutionOutcome, EvolutionError> {
        let Ok(_cycle) = self.in_flight.try_lock() else {
            warn!("PopulationManager: Evolution already in progress, trigger ignored");
            self.count_cycle("busy");
            return Err(EvolutionError::CycleInProgress);
        };
        let _gate = self.gate.write().await;

        match self.evolve().await {
            Ok(outcome) => {
                self.count_cycle(if outcome.is_noop() { "noop" } else { "completed" });
                Ok(outcome)
            }
            Err(e) => {
                error!("PopulationManager: Evolution cycle failed: {}", e);
                self.count_cycle("error");
                let event = SystemEvent::error(EVENT_SOURCE, format!("Evolution failed: {}", e));
                if let Err(log_err) = self.store.insert_system_event(&event).await {
                    warn!(
                        "PopulationManager: Could not record failure event: {}",
                        log_err
                    );
                }
                Err(e)
            }
        }
    }

    fn count_cycle(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_evolution_cycle(result);
        }
    }

    async fn evolve(&self) -> Result<EvolutionOutcome, EvolutionError> {
        let Some(active) = self.store.get_active_generation().await? else {
            warn!("PopulationManager: No active generation, nothing to evolve");
            self.store
                .insert_system_event(&SystemEvent::warning(
                    EVENT_SOURCE,
                    "No active generation; seed the population first",
                ))
                .await?;
            return Ok(EvolutionOutcome::default());
        };

        let agents = self.store.list_agents(&AgentFilter::evolvable()).await?;
        if agents.is_empty() {
            warn!(
                "PopulationManager: No eligible agents in generation {}, nothing to evolve",
                active.index
            );
            self.store
                .insert_system_event(&SystemEvent::warning(
                    EVENT_SOURCE,
                    format!("Generation {}: no eligible agents", active.index),
                ))
                .await?;
            return Ok(EvolutionOutcome::default());
        }

        let next = active.successor(self.snapshot());
        let plan = self.with_rng(|rng| plan_generation(agents, &self.config, next.index, rng));
        info!(
            "PopulationManager: Generation {} scored {} agents (avg fitness {:.2}): {} elites, {} survivors, {} eliminated",
            active.index,
            plan.stats.population_size,
            plan.stats.average_fitness,
            plan.stats.elites,
            plan.stats.survivors,
            plan.stats.eliminated
        );

        let now = Utc::now();
        for scored in &plan.selection.eliminated {
            let patch = AgentPatch::eliminated(now).with_metrics(scored.agent.metrics.clone());
            let updated = self.store.update_agent(scored.id(), &patch).await?;
            self.event_bus
                .publish(DomainEvent::AgentUpdated(updated))
                .await;
        }

        let completed = self
            .store
            .rotate_generation(active.id, plan.stats.clone(), &next)
            .await?;

        for scored in &plan.selection.survivors {
            let patch = AgentPatch::default()
                .with_generation(next.index)
                .with_metrics(scored.agent.metrics.clone());
            let updated = self.store.update_agent(scored.id(), &patch).await?;
            self.event_bus
                .publish(DomainEvent::AgentUpdated(updated))
                .await;
        }

        let offspring = self.store.insert_agents(plan.offspring.clone()).await?;
        for child in &offspring {
            self.event_bus
                .publish(DomainEvent::AgentUpdated(child.clone()))
                .await;
        }

        self.store
            .insert_system_event(&SystemEvent::info(
                EVENT_SOURCE,
                format!(
                    "Generation {} completed -> {}: {} survivors, {} eliminated, {} offspring, avg fitness {:.2}",
                    completed.index,
                    next.index,
                    plan.stats.survivors,
                    plan.stats.eliminated,
                    offspring.len(),
                    plan.stats.average_fitness
                ),
            ))
            .await?;
        self.event_bus
            .publish(DomainEvent::GenerationCompleted {
                completed: completed.clone(),
                next_index: next.index,
            })
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.generation_index.set(next.index as f64);
            metrics
                .population_average_fitness
                .set(plan.stats.average_fitness);
        }

        info!(
            "PopulationManager: Generation {} is now active ({} agents)",
            next.index,
            plan.selection.survivors.len() + offspring.len()
        );

        Ok(EvolutionOutcome {
            completed_generation: Some(completed.index),
            new_generation: Some(next.index),
            population: plan.stats.population_size,
            elites: plan.selection.elites.iter().map(ScoredAgent::id).collect(),
            survivors: plan.selection.survivors.iter().map(ScoredAgent::id).collect(),
            eliminated: plan.selection.eliminated.iter().map(ScoredAgent::id).collect(),
            offspring: offspring.iter().map(|a| a.id).collect(),
            average_fitness: plan.stats.average_fitness,
        })
    }

    /// Run a cycle every `interval` until `shutdown` flips to true. The
    /// first cycle fires one full interval after start, and each following
    /// one a full interval after the previous cycle finished.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.interval;
        info!(
            "PopulationManager: Starting evolution loop (interval: {:?})",
            period
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    match self.run_cycle().await {
                        Ok(outcome) if outcome.is_noop() => {
                            info!("PopulationManager: Scheduled cycle was a no-op");
                        }
                        Ok(_) => {}
                        Err(EvolutionError::CycleInProgress) => {}
                        Err(e) => error!("PopulationManager: Scheduled cycle failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("PopulationManager: Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }
}
