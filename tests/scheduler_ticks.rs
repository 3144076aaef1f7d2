use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use evotrade::application::execution::SimulatedExecutor;
use evotrade::application::new_population_gate;
use evotrade::application::scheduler::ExecutionScheduler;
use evotrade::application::strategies::StrategyRegistry;
use evotrade::config::{SchedulerConfig, SimulationConfig};
use evotrade::domain::agent::{Agent, AgentFilter, AgentId, AgentStatus};
use evotrade::domain::dna::{Dna, StrategyKind};
use evotrade::domain::events::SystemEventLevel;
use evotrade::domain::market::MarketState;
use evotrade::domain::ports::MarketDataProvider;
use evotrade::domain::repositories::AgentStore;
use evotrade::infrastructure::{EventBus, InMemoryAgentStore};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Feed that tracks how many snapshots are in flight at once.
#[derive(Default)]
struct CountingFeed {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    failing: Option<AgentId>,
}

#[async_trait]
impl MarketDataProvider for CountingFeed {
    async fn snapshot(&self, agent: &Agent) -> Result<MarketState> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(15)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing == Some(agent.id) {
            anyhow::bail!("quote service unreachable");
        }
        Ok(MarketState {
            symbol: "ETH/USD".to_string(),
            price: dec!(2000),
            momentum: 0.0,
            z_score: 0.0,
            base_balance: dec!(1),
            quote_balance: dec!(5000),
            timestamp: Utc::now(),
        })
    }
}

fn scheduler(
    store: Arc<InMemoryAgentStore>,
    feed: Arc<CountingFeed>,
    batch_size: usize,
) -> ExecutionScheduler {
    ExecutionScheduler::new(
        store,
        feed,
        StrategyRegistry::with_defaults(),
        Arc::new(SimulatedExecutor::new(&SimulationConfig::default(), Some(4))),
        EventBus::new(),
        SchedulerConfig {
            poll_interval: Duration::from_millis(10),
            batch_size,
        },
        new_population_gate(),
    )
}

fn population(n: usize) -> Vec<Agent> {
    (0..n)
        .map(|i| {
            Agent::new(
                Dna {
                    strategy_kind: StrategyKind::ALL[i % 2],
                    ..Dna::default()
                },
                0,
                vec![],
            )
        })
        .collect()
}

#[tokio::test]
async fn test_in_flight_cycles_never_exceed_batch_size() {
    let store = Arc::new(InMemoryAgentStore::new());
    store.insert_agents(population(25)).await.unwrap();
    let feed = Arc::new(CountingFeed::default());
    let scheduler = scheduler(store.clone(), feed.clone(), 4);

    let report = scheduler.run_tick().await.unwrap();

    assert_eq!(report.agents, 25);
    assert_eq!(report.batches, 7);
    assert!(report.errored.is_empty());
    assert_eq!(report.filled + report.execution_failures + report.skipped, 25);
    let peak = feed.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak concurrency {}", peak);
    assert!(peak >= 2, "batch never ran concurrently");
}

#[tokio::test]
async fn test_failing_agent_is_isolated_and_skipped_next_tick() {
    // 1. Setup: one agent whose market snapshot always fails
    let store = Arc::new(InMemoryAgentStore::new());
    let agents = population(6);
    let broken = agents[2].id;
    store.insert_agents(agents).await.unwrap();
    let feed = Arc::new(CountingFeed {
        failing: Some(broken),
        ..CountingFeed::default()
    });
    let scheduler = scheduler(store.clone(), feed, 3);

    // 2. First tick: the failure is absorbed
    let report = scheduler.run_tick().await.unwrap();
    assert_eq!(report.errored, vec![broken]);
    assert_eq!(report.agents, 6);

    let stored = store.get_agent(broken).await.unwrap().unwrap();
    assert_eq!(stored.status, AgentStatus::Error);

    // Every healthy agent still completed its cycle
    let healthy = store.list_agents(&AgentFilter::running()).await.unwrap();
    assert_eq!(healthy.len(), 5);
    assert!(healthy.iter().all(|a| a.last_heartbeat_at.is_some()));

    let events = store.list_system_events().await.unwrap();
    let failure = events
        .iter()
        .find(|e| e.agent_id == Some(broken))
        .expect("failure should be persisted");
    assert_eq!(failure.level, SystemEventLevel::Error);
    assert_eq!(failure.source, "scheduler");

    // 3. Second tick: the errored agent is no longer scheduled
    let report = scheduler.run_tick().await.unwrap();
    assert_eq!(report.agents, 5);
    assert!(report.errored.is_empty());
}

#[tokio::test]
async fn test_hold_decisions_are_recorded_without_trades() {
    // Zero momentum and zero z-score keep both strategies below the gate.
    let store = Arc::new(InMemoryAgentStore::new());
    let agents = population(2);
    let ids: Vec<_> = agents.iter().map(|a| a.id).collect();
    store.insert_agents(agents).await.unwrap();
    let scheduler = scheduler(store.clone(), Arc::new(CountingFeed::default()), 10);

    let report = scheduler.run_tick().await.unwrap();
    assert_eq!(report.skipped, 2);

    for id in ids {
        let agent = store.get_agent(id).await.unwrap().unwrap();
        assert_eq!(agent.metrics.total_trades, 0);
        assert!(agent.last_heartbeat_at.is_some());

        let records = store.list_execution_records(id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_trade());
        assert!(store.list_metric_snapshots(id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_run_loop_stops_on_shutdown() {
    let store = Arc::new(InMemoryAgentStore::new());
    store.insert_agents(population(3)).await.unwrap();
    let scheduler = Arc::new(scheduler(
        store.clone(),
        Arc::new(CountingFeed::default()),
        2,
    ));

    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(scheduler.run(rx));
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("scheduler loop did not stop")
        .unwrap();

    let records = store
        .list_agents(&AgentFilter::all())
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.last_heartbeat_at.is_some())
        .count();
    assert_eq!(records, 3);
}
