//! Push-based metrics reporter for evotrade
//!
//! Periodically outputs a population summary as structured JSON to stdout.

use crate::domain::agent::{AgentFilter, AgentStatus};
use crate::domain::repositories::AgentStore;
use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

const STATUSES: [AgentStatus; 5] = [
    AgentStatus::Running,
    AgentStatus::Paused,
    AgentStatus::Error,
    AgentStatus::Offline,
    AgentStatus::Eliminated,
];

/// Metrics snapshot for JSON output
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub population: PopulationSnapshot,
}

#[derive(Debug, Serialize)]
pub struct PopulationSnapshot {
    pub active_generation: Option<u32>,
    pub agents_by_status: BTreeMap<String, usize>,
    /// Mean fitness over running and paused agents.
    pub average_fitness: Option<f64>,
    pub best_fitness: Option<f64>,
    pub total_profit_usd: f64,
}

/// Push-based metrics reporter
///
/// Outputs metrics as structured JSON logs on a configurable interval.
pub struct MetricsReporter {
    store: Arc<dyn AgentStore>,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(store: Arc<dyn AgentStore>, metrics: Metrics, interval: Duration) -> Self {
        Self {
            store,
            metrics,
            start_time: Instant::now(),
            interval,
        }
    }

    /// Run the reporter until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => self.report().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("MetricsReporter: Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }

    async fn report(&self) {
        match self.collect_snapshot().await {
            Ok(snapshot) => match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    // Prefix keeps the line greppable in mixed log output
                    println!("METRICS_JSON:{}", json);
                    info!(
                        "Population: generation {:?} | avg fitness {:.2} | uptime {}s",
                        snapshot.population.active_generation,
                        snapshot.population.average_fitness.unwrap_or_default(),
                        snapshot.uptime_seconds
                    );
                }
                Err(e) => warn!("Failed to serialize metrics: {}", e),
            },
            Err(e) => warn!("Failed to collect metrics: {}", e),
        }
    }

    /// Collect current metrics snapshot and refresh the status gauges.
    pub async fn collect_snapshot(&self) -> anyhow::Result<MetricsSnapshot> {
        let agents = self.store.list_agents(&AgentFilter::all()).await?;
        let active_generation = self.store.get_active_generation().await?.map(|g| g.index);
        let uptime = self.start_time.elapsed().as_secs();

        let mut agents_by_status = BTreeMap::new();
        for status in STATUSES {
            let count = agents.iter().filter(|a| a.status == status).count();
            self.metrics
                .set_agents_with_status(&status.to_string(), count);
            agents_by_status.insert(status.to_string(), count);
        }

        let live: Vec<f64> = agents
            .iter()
            .filter(|a| a.status.is_evolvable())
            .map(|a| a.metrics.fitness_score)
            .collect();
        let average_fitness =
            (!live.is_empty()).then(|| live.iter().sum::<f64>() / live.len() as f64);
        let best_fitness = live.iter().copied().reduce(f64::max);
        let total_profit_usd = agents.iter().map(|a| a.metrics.total_profit).sum();

        if let Some(index) = active_generation {
            self.metrics.generation_index.set(index as f64);
        }

        Ok(MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            population: PopulationSnapshot {
                active_generation,
                agents_by_status,
                average_fitness,
                best_fitness,
                total_profit_usd,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{Agent, AgentPatch};
    use crate::domain::dna::Dna;
    use crate::domain::generation::{EvolutionSnapshot, Generation};
    use crate::infrastructure::InMemoryAgentStore;

    #[tokio::test]
    async fn test_snapshot_counts_statuses() {
        let store = Arc::new(InMemoryAgentStore::new());
        let generation = Generation::genesis(EvolutionSnapshot {
            mutation_rate: 0.15,
            elite_fraction: 0.2,
            elimination_fraction: 0.3,
            tournament_size: 3,
        });
        store.insert_generation(&generation).await.unwrap();

        let mut strong = Agent::new(Dna::default(), 0, vec![]);
        strong.metrics.fitness_score = 80.0;
        let weak = Agent::new(Dna::default(), 0, vec![]);
        let gone = Agent::new(Dna::default(), 0, vec![]);
        store
            .insert_agents(vec![strong, weak, gone.clone()])
            .await
            .unwrap();
        store
            .update_agent(gone.id, &AgentPatch::eliminated(chrono::Utc::now()))
            .await
            .unwrap();

        let metrics = Metrics::new().expect("Failed to create metrics");
        let reporter = MetricsReporter::new(store, metrics.clone(), Duration::from_secs(60));
        let snapshot = reporter
            .collect_snapshot()
            .await
            .expect("Failed to collect snapshot");

        assert_eq!(snapshot.population.active_generation, Some(0));
        assert_eq!(snapshot.population.agents_by_status["running"], 2);
        assert_eq!(snapshot.population.agents_by_status["eliminated"], 1);
        assert_eq!(snapshot.population.average_fitness, Some(65.0));
        assert_eq!(snapshot.population.best_fitness, Some(80.0));
        assert!(
            metrics
                .render()
                .contains("evotrade_agents{status=\"running\"} 2")
        );
    }

    #[tokio::test]
    async fn test_snapshot_of_empty_store_serializes() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        let reporter = MetricsReporter::new(
            Arc::new(InMemoryAgentStore::new()),
            metrics,
            Duration::from_secs(1),
        );
        let snapshot = reporter.collect_snapshot().await.unwrap();
        assert!(snapshot.population.average_fitness.is_none());

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"active_generation\":null"));
        assert!(json.contains("\"uptime_seconds\""));
    }
}
