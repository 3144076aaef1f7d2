use std::sync::Arc;

// Population evolution: ranking, selection, breeding
pub mod evolution;

// Simulated trade execution
pub mod execution;

// Bounded-concurrency agent scheduler
pub mod scheduler;

// Trading strategies
pub mod strategies;

// System orchestrator
pub mod system;

/// Coordinates the scheduler with the population manager. A scheduler tick
/// holds the read side; an evolution cycle holds the write side, so no agent
/// cycle observes a half-rotated population.
pub type PopulationGate = Arc<tokio::sync::RwLock<()>>;

pub fn new_population_gate() -> PopulationGate {
    Arc::new(tokio::sync::RwLock::new(()))
}
