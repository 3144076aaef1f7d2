use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::evolution::{EvolutionOutcome, PopulationManager};
use crate::application::execution::SimulatedExecutor;
use crate::application::scheduler::ExecutionScheduler;
use crate::application::strategies::StrategyRegistry;
use crate::application::{PopulationGate, new_population_gate};
use crate::config::Config;
use crate::domain::agent::{Agent, AgentId};
use crate::domain::errors::EvolutionError;
use crate::domain::events::LoggingListener;
use crate::domain::generation::Generation;
use crate::domain::repositories::AgentStore;
use crate::infrastructure::observability::{Metrics, MetricsReporter};
use crate::infrastructure::persistence::{Database, SqliteAgentStore};
use crate::infrastructure::simulation::RandomWalkMarketFeed;
use crate::infrastructure::{EventBus, InMemoryAgentStore};

pub const MARKET_SYMBOL: &str = "ETH/USD";
pub const MARKET_START_PRICE: f64 = 2000.0;

// Offsets keep component RNG streams independent under one RNG_SEED.
const FEED_SEED_OFFSET: u64 = 1;
const EXECUTOR_SEED_OFFSET: u64 = 2;
const EVOLUTION_SEED_OFFSET: u64 = 3;

/// Running system: background loops plus direct access to the components
/// for manual control.
pub struct SystemHandle {
    pub store: Arc<dyn AgentStore>,
    pub scheduler: Arc<ExecutionScheduler>,
    pub population_manager: Arc<PopulationManager>,
    pub event_bus: EventBus,
    pub metrics: Metrics,
    pub genesis: Generation,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SystemHandle {
    /// Run one evolution cycle now, subject to the single-flight guard.
    pub async fn trigger_evolution(&self) -> Result<EvolutionOutcome, EvolutionError> {
        info!("SystemHandle: Manual evolution trigger");
        self.population_manager.run_cycle().await
    }

    pub async fn pause_agent(&self, id: AgentId) -> Result<Agent> {
        self.scheduler.pause_agent(id).await
    }

    pub async fn resume_agent(&self, id: AgentId) -> Result<Agent> {
        self.scheduler.resume_agent(id).await
    }

    /// Signal every loop to stop and wait for them. A tick or evolution
    /// cycle already in progress finishes first.
    pub async fn shutdown(self) {
        info!("SystemHandle: Shutting down background loops...");
        if self.shutdown_tx.send(true).is_err() {
            warn!("SystemHandle: All loops already stopped");
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("SystemHandle: Background task ended abnormally: {}", e);
            }
        }
        info!("SystemHandle: Shutdown complete");
    }
}

pub struct Application {
    pub config: Config,
    pub store: Arc<dyn AgentStore>,
    pub scheduler: Arc<ExecutionScheduler>,
    pub population_manager: Arc<PopulationManager>,
    pub event_bus: EventBus,
    pub metrics: Metrics,
    pub gate: PopulationGate,
}

impl Application {
    /// Build the system with the store selected by `DATABASE_URL`.
    pub async fn build(config: Config) -> Result<Self> {
        let store: Arc<dyn AgentStore> = match &config.database_url {
            Some(url) => {
                info!("Application: Using SQLite store at {}", url);
                let db = Database::new(url)
                    .await
                    .context("Failed to initialize database")?;
                Arc::new(SqliteAgentStore::new(db.pool))
            }
            None => {
                info!("Application: DATABASE_URL not set, using in-memory store");
                Arc::new(InMemoryAgentStore::new())
            }
        };
        Self::with_store(config, store).await
    }

    /// Build the system around an existing store.
    pub async fn with_store(config: Config, store: Arc<dyn AgentStore>) -> Result<Self> {
        let metrics = Metrics::new().context("Failed to register metrics")?;
        let event_bus = EventBus::new();
        event_bus.subscribe(Arc::new(LoggingListener)).await;
        let gate = new_population_gate();
        let seed = |offset: u64| config.rng_seed.map(|s| s.wrapping_add(offset));

        let market = Arc::new(RandomWalkMarketFeed::new(
            MARKET_SYMBOL,
            MARKET_START_PRICE,
            &config.simulation,
            seed(FEED_SEED_OFFSET),
        ));
        let executor = Arc::new(SimulatedExecutor::new(
            &config.simulation,
            seed(EXECUTOR_SEED_OFFSET),
        ));

        let scheduler = Arc::new(
            ExecutionScheduler::new(
                store.clone(),
                market,
                StrategyRegistry::with_defaults(),
                executor,
                event_bus.clone(),
                config.scheduler.clone(),
                gate.clone(),
            )
            .with_metrics(metrics.clone()),
        );

        let population_manager = Arc::new(
            PopulationManager::new(
                store.clone(),
                event_bus.clone(),
                config.evolution.clone(),
                gate.clone(),
                seed(EVOLUTION_SEED_OFFSET),
            )
            .with_metrics(metrics.clone()),
        );

        info!(
            "Application: Built (batch size {}, poll {:?}, evolution every {:?})",
            config.scheduler.batch_size, config.scheduler.poll_interval, config.evolution.interval
        );

        Ok(Self {
            config,
            store,
            scheduler,
            population_manager,
            event_bus,
            metrics,
            gate,
        })
    }

    /// Seed generation 0 if needed and start the scheduler, evolution and
    /// reporter loops.
    pub async fn start(self) -> Result<SystemHandle> {
        let genesis = self
            .population_manager
            .seed_population(self.config.evolution.initial_population)
            .await
            .context("Failed to seed initial population")?;
        info!("Application: Active generation {}", genesis.index);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(
            self.scheduler.clone().run(shutdown_rx.clone()),
        ));
        tasks.push(tokio::spawn(
            self.population_manager.clone().run(shutdown_rx.clone()),
        ));

        if self.config.observability.enabled {
            let reporter = MetricsReporter::new(
                self.store.clone(),
                self.metrics.clone(),
                self.config.observability.interval,
            );
            tasks.push(tokio::spawn(reporter.run(shutdown_rx)));
            info!(
                "Application: Metrics reporter started (interval: {:?})",
                self.config.observability.interval
            );
        } else {
            info!("Application: Metrics reporting disabled");
        }

        Ok(SystemHandle {
            store: self.store,
            scheduler: self.scheduler,
            population_manager: self.population_manager,
            event_bus: self.event_bus,
            metrics: self.metrics,
            genesis,
            shutdown_tx,
            tasks,
        })
    }
}
