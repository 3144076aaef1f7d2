use evotrade::application::evolution::PopulationManager;
use evotrade::application::new_population_gate;
use evotrade::config::EvolutionConfig;
use evotrade::domain::agent::{AgentFilter, AgentId, AgentPatch, AgentStatus};
use evotrade::domain::dna::DnaField;
use evotrade::domain::errors::EvolutionError;
use evotrade::domain::events::SystemEventLevel;
use evotrade::domain::generation::GenerationStatus;
use evotrade::domain::repositories::AgentStore;
use evotrade::infrastructure::{EventBus, InMemoryAgentStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn manager(store: Arc<InMemoryAgentStore>, seed: u64) -> PopulationManager {
    PopulationManager::new(
        store,
        EventBus::new(),
        EvolutionConfig::default(),
        new_population_gate(),
        Some(seed),
    )
}

/// Seed ten agents and give them strictly increasing period profit, so
/// ranking is fully determined. Returns ids best first.
async fn seeded_population(store: &Arc<InMemoryAgentStore>, manager: &PopulationManager) -> Vec<AgentId> {
    assert_ok!(manager.seed_population(10).await);
    let agents = store.list_agents(&AgentFilter::all()).await.unwrap();
    assert_eq!(agents.len(), 10);

    for (i, agent) in agents.iter().enumerate() {
        let mut metrics = agent.metrics.clone();
        metrics.profit_period = -200.0 + 50.0 * i as f64;
        metrics.win_rate_period = 0.5;
        metrics.trades_period = 10;
        store
            .update_agent(agent.id, &AgentPatch::default().with_metrics(metrics))
            .await
            .unwrap();
    }

    agents.iter().rev().map(|a| a.id).collect()
}

#[tokio::test]
async fn test_ten_agent_cycle_counts_and_membership() {
    // 1. Setup
    let store = Arc::new(InMemoryAgentStore::new());
    let manager = manager(store.clone(), 11);
    let ranked_ids = seeded_population(&store, &manager).await;

    // 2. Evolve
    let outcome = assert_ok!(manager.run_cycle().await);

    // 3. Counts: floor(10*0.2)=2 elites, floor(10*0.3)=3 eliminated
    assert_eq!(outcome.completed_generation, Some(0));
    assert_eq!(outcome.new_generation, Some(1));
    assert_eq!(outcome.elites.len(), 2);
    assert_eq!(outcome.survivors.len(), 7);
    assert_eq!(outcome.eliminated.len(), 3);
    assert_eq!(outcome.offspring.len(), 3);

    // Elites are the two fittest and are among the survivors
    assert_eq!(outcome.elites, ranked_ids[..2].to_vec());
    assert!(outcome.elites.iter().all(|id| outcome.survivors.contains(id)));

    // Survivors and eliminated partition the old population
    let survivors: HashSet<_> = outcome.survivors.iter().copied().collect();
    let eliminated: HashSet<_> = outcome.eliminated.iter().copied().collect();
    assert!(survivors.is_disjoint(&eliminated));
    assert_eq!(survivors.len() + eliminated.len(), 10);

    // 4. Store state
    let next_gen = store
        .list_agents(&AgentFilter::evolvable().in_generation(1))
        .await
        .unwrap();
    assert_eq!(next_gen.len(), 10);
    for agent in &next_gen {
        assert!(!eliminated.contains(&agent.id));
        assert_eq!(agent.generation_index, 1);
    }

    for id in &outcome.eliminated {
        let agent = store.get_agent(*id).await.unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Eliminated);
        assert!(agent.eliminated_at.is_some());
        assert_eq!(agent.generation_index, 0);
    }

    for id in &outcome.offspring {
        let child = store.get_agent(*id).await.unwrap().unwrap();
        assert_eq!(child.status, AgentStatus::Running);
        assert_eq!(child.metrics.total_trades, 0);
        assert_eq!(child.parent_ids.len(), 2);
        assert!(child.parent_ids.iter().all(|p| survivors.contains(p)));
        for field in DnaField::ALL {
            let (min, max) = field.bounds();
            let value = child.dna.get(field);
            assert!(value >= min && value <= max, "{} = {}", field.name(), value);
        }
    }
}

#[tokio::test]
async fn test_exactly_one_active_generation_across_cycles() {
    let store = Arc::new(InMemoryAgentStore::new());
    let manager = manager(store.clone(), 5);
    seeded_population(&store, &manager).await;

    for expected in 1..=3u32 {
        let outcome = assert_ok!(manager.run_cycle().await);
        assert_eq!(outcome.new_generation, Some(expected));

        let generations = store.list_generations().await.unwrap();
        let active: Vec<_> = generations
            .iter()
            .filter(|g| g.status == GenerationStatus::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].index, expected);
        assert!(
            generations
                .iter()
                .filter(|g| g.status == GenerationStatus::Completed)
                .all(|g| g.stats.is_some() && g.completed_at.is_some())
        );
    }

    // The population size is preserved: one child per eliminated agent
    let live = store.list_agents(&AgentFilter::evolvable()).await.unwrap();
    assert_eq!(live.len(), 10);
}

#[tokio::test]
async fn test_concurrent_trigger_is_rejected() {
    let store = Arc::new(InMemoryAgentStore::new());
    let gate = new_population_gate();
    let manager = Arc::new(PopulationManager::new(
        store.clone(),
        EventBus::new(),
        EvolutionConfig::default(),
        gate.clone(),
        Some(3),
    ));
    assert_ok!(manager.seed_population(6).await);

    // Park the first cycle on the population gate so it stays in flight.
    let tick_guard = gate.read().await;
    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.run_cycle().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = manager.run_cycle().await;
    assert!(matches!(second, Err(EvolutionError::CycleInProgress)));

    drop(tick_guard);
    let outcome = assert_ok!(first.await.unwrap());
    assert_eq!(outcome.new_generation, Some(1));

    let generations = store.list_generations().await.unwrap();
    assert_eq!(generations.len(), 2);
}

#[tokio::test]
async fn test_cycle_without_eligible_agents_is_noop() {
    let store = Arc::new(InMemoryAgentStore::new());
    let manager = manager(store.clone(), 9);
    assert_ok!(manager.seed_population(4).await);

    for agent in store.list_agents(&AgentFilter::all()).await.unwrap() {
        store
            .update_agent(agent.id, &AgentPatch::status(AgentStatus::Error))
            .await
            .unwrap();
    }

    let outcome = assert_ok!(manager.run_cycle().await);
    assert!(outcome.is_noop());

    let active = store.get_active_generation().await.unwrap().unwrap();
    assert_eq!(active.index, 0);
    let events = store.list_system_events().await.unwrap();
    assert!(events.iter().any(|e| e.level == SystemEventLevel::Warning));
}

#[tokio::test]
async fn test_cycle_without_active_generation_is_noop() {
    let store = Arc::new(InMemoryAgentStore::new());
    let manager = manager(store.clone(), 1);
    let outcome = assert_ok!(manager.run_cycle().await);
    assert!(outcome.is_noop());
    assert_eq!(outcome.completed_generation, None);

    let events = store.list_system_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, SystemEventLevel::Warning);
    assert_eq!(events[0].source, "population_manager");
}

#[tokio::test]
async fn test_genesis_is_idempotent() {
    let store = Arc::new(InMemoryAgentStore::new());
    let manager = manager(store.clone(), 2);

    let first = assert_ok!(manager.seed_population(8).await);
    let second = assert_ok!(manager.seed_population(8).await);
    assert_eq!(first.id, second.id);
    assert_eq!(
        store.list_agents(&AgentFilter::all()).await.unwrap().len(),
        8
    );
}
