//! Execution Scheduler
//!
//! Drives one cycle per running agent on a fixed interval. Agents are
//! processed in batches of `batch_size`: every cycle in a batch runs
//! concurrently and the next batch starts only once the whole batch is
//! done. A failing cycle marks its agent `error` and never aborts the batch.

use crate::application::PopulationGate;
use crate::application::execution::{ExecutionOutcome, SimulatedExecutor};
use crate::application::strategies::StrategyRegistry;
use crate::config::SchedulerConfig;
use crate::domain::agent::{Agent, AgentFilter, AgentId, AgentPatch, AgentStatus};
use crate::domain::errors::StoreError;
use crate::domain::events::{DomainEvent, SystemEvent};
use crate::domain::execution::MetricSnapshot;
use crate::domain::ports::MarketDataProvider;
use crate::domain::repositories::AgentStore;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const EVENT_SOURCE: &str = "scheduler";

/// What a successful agent cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Trade filled and folded into the metrics.
    Filled,
    /// Execution failed; recorded, metrics untouched.
    ExecutionFailed,
    /// Hold or below the confidence gate.
    Skipped,
}

impl CycleOutcome {
    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Filled => "filled",
            CycleOutcome::ExecutionFailed => "failed",
            CycleOutcome::Skipped => "skipped",
        }
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub agents: usize,
    pub batches: usize,
    pub filled: usize,
    pub execution_failures: usize,
    pub skipped: usize,
    /// Agents whose cycle failed and were marked `error`.
    pub errored: Vec<AgentId>,
}

pub struct ExecutionScheduler {
    store: Arc<dyn AgentStore>,
    market: Arc<dyn MarketDataProvider>,
    strategies: StrategyRegistry,
    executor: Arc<SimulatedExecutor>,
    event_bus: EventBus,
    config: SchedulerConfig,
    gate: PopulationGate,
    metrics: Option<Metrics>,
}

impl ExecutionScheduler {
    pub fn new(
        store: Arc<dyn AgentStore>,
        market: Arc<dyn MarketDataProvider>,
        strategies: StrategyRegistry,
        executor: Arc<SimulatedExecutor>,
        event_bus: EventBus,
        config: SchedulerConfig,
        gate: PopulationGate,
    ) -> Self {
        Self {
            store,
            market,
            strategies,
            executor,
            event_bus,
            config,
            gate,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run one tick over every running agent. Fails only when the agent
    /// list cannot be fetched; per-agent failures are absorbed.
    pub async fn run_tick(&self) -> Result<TickReport> {
        let started = std::time::Instant::now();
        let _gate = self.gate.read().await;

        let agents = self
            .store
            .list_agents(&AgentFilter::running())
            .await
            .context("Failed to list running agents")?;

        let batch_size = self.config.batch_size.max(1);
        let mut report = TickReport {
            agents: agents.len(),
            ..TickReport::default()
        };

        for batch in agents.chunks(batch_size) {
            report.batches += 1;
            let results = join_all(batch.iter().map(|agent| self.run_cycle(agent))).await;

            for (agent, result) in batch.iter().zip(results) {
                match result {
                    Ok(CycleOutcome::Filled) => report.filled += 1,
                    Ok(CycleOutcome::ExecutionFailed) => report.execution_failures += 1,
                    Ok(CycleOutcome::Skipped) => report.skipped += 1,
                    Err(e) => {
                        self.mark_error(agent, &e).await;
                        report.errored.push(agent.id);
                    }
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics
                .tick_duration_seconds
                .observe(started.elapsed().as_secs_f64());
        }
        debug!(
            "ExecutionScheduler: Tick done in {:?}: {} agents, {} batches, {} filled, {} failed, {} skipped, {} errors",
            started.elapsed(),
            report.agents,
            report.batches,
            report.filled,
            report.execution_failures,
            report.skipped,
            report.errored.len()
        );
        Ok(report)
    }

    /// One agent cycle: snapshot, decide, execute, fold metrics, persist,
    /// publish.
    pub async fn run_cycle(&self, agent: &Agent) -> Result<CycleOutcome> {
        let market = self
            .market
            .snapshot(agent)
            .await
            .with_context(|| format!("Market snapshot failed for {}", agent.name))?;

        let strategy = self
            .strategies
            .get(agent.dna.strategy_kind)
            .with_context(|| format!("No strategy registered for {}", agent.dna.strategy_kind))?;

        let decision = strategy.decide(&market, &agent.dna);
        let outcome = self.executor.execute(agent.id, &decision, &market);

        self.store
            .insert_execution_record(outcome.record())
            .await
            .context("Failed to persist execution record")?;
        if let Some(metrics) = &self.metrics {
            let record = outcome.record();
            metrics.inc_execution(&record.action.to_string(), outcome.label());
        }
        self.event_bus
            .publish(DomainEvent::TransactionNew(outcome.record().clone()))
            .await;

        let mut patch = AgentPatch::heartbeat(Utc::now());
        let cycle = match &outcome {
            ExecutionOutcome::Filled { pnl, .. } => {
                let mut metrics = agent.metrics.clone();
                metrics.record_trade(*pnl);
                patch = patch.with_metrics(metrics);
                CycleOutcome::Filled
            }
            ExecutionOutcome::Failed(_) => CycleOutcome::ExecutionFailed,
            ExecutionOutcome::Skipped(_) => CycleOutcome::Skipped,
        };

        let updated = self
            .store
            .update_agent(agent.id, &patch)
            .await
            .context("Failed to persist agent update")?;

        if cycle == CycleOutcome::Filled {
            self.store
                .insert_metric_snapshot(&MetricSnapshot::capture(&updated))
                .await
                .context("Failed to append metric snapshot")?;
        }

        self.event_bus
            .publish(DomainEvent::AgentUpdated(updated))
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.inc_agent_cycle(cycle.label());
        }
        Ok(cycle)
    }

    async fn mark_error(&self, agent: &Agent, cause: &anyhow::Error) {
        error!(
            "ExecutionScheduler: Cycle failed for {} ({}): {:#}",
            agent.name, agent.id, cause
        );
        if let Some(metrics) = &self.metrics {
            metrics.inc_agent_cycle("error");
        }

        match self
            .store
            .update_agent(agent.id, &AgentPatch::status(AgentStatus::Error))
            .await
        {
            Ok(updated) => {
                self.event_bus
                    .publish(DomainEvent::AgentUpdated(updated))
                    .await
            }
            Err(e) => warn!(
                "ExecutionScheduler: Could not mark {} as error: {}",
                agent.id, e
            ),
        }

        let event = SystemEvent::error(EVENT_SOURCE, format!("Agent cycle failed: {:#}", cause))
            .for_agent(agent.id);
        if let Err(e) = self.store.insert_system_event(&event).await {
            warn!("ExecutionScheduler: Could not record system event: {}", e);
        }
    }

    /// running -> paused.
    pub async fn pause_agent(&self, id: AgentId) -> Result<Agent> {
        let agent = self.load(id).await?;
        if agent.status != AgentStatus::Running {
            return Err(StoreError::InvalidTransition {
                id,
                from: agent.status,
                to: AgentStatus::Paused,
            }
            .into());
        }
        self.set_status(id, AgentStatus::Paused).await
    }

    /// paused or error -> running. Eliminated agents stay eliminated.
    pub async fn resume_agent(&self, id: AgentId) -> Result<Agent> {
        let agent = self.load(id).await?;
        match agent.status {
            AgentStatus::Running => Ok(agent),
            AgentStatus::Paused | AgentStatus::Error => {
                self.set_status(id, AgentStatus::Running).await
            }
            AgentStatus::Eliminated => Err(StoreError::EliminatedAgent(id).into()),
            other => Err(StoreError::InvalidTransition {
                id,
                from: other,
                to: AgentStatus::Running,
            }
            .into()),
        }
    }

    async fn load(&self, id: AgentId) -> Result<Agent> {
        self.store
            .get_agent(id)
            .await?
            .ok_or_else(|| StoreError::AgentNotFound(id).into())
    }

    async fn set_status(&self, id: AgentId, status: AgentStatus) -> Result<Agent> {
        let updated = self
            .store
            .update_agent(id, &AgentPatch::status(status))
            .await?;
        info!("ExecutionScheduler: {} is now {}", updated.name, status);
        self.event_bus
            .publish(DomainEvent::AgentUpdated(updated.clone()))
            .await;
        Ok(updated)
    }

    /// Tick every `poll_interval` until `shutdown` flips to true. A tick
    /// that cannot list agents is logged and skipped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "ExecutionScheduler: Starting (interval: {:?}, batch size: {})",
            self.config.poll_interval, self.config.batch_size
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_tick().await {
                        error!("ExecutionScheduler: Skipping tick: {:#}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("ExecutionScheduler: Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }
}
