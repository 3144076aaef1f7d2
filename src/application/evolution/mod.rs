pub mod breeding;
pub mod population_manager;
pub mod selection;

pub use population_manager::{EvolutionOutcome, EvolutionPlan, PopulationManager, plan_generation};
pub use selection::{ScoredAgent, TournamentSelector};
