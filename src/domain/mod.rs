// Agents and their strategy parameters
pub mod agent;
pub mod dna;

// Generation cohorts
pub mod generation;

// Trades and metric history
pub mod execution;

// Domain events and the persisted system log
pub mod events;

// Market snapshots consumed by strategies
pub mod market;

// Fitness scoring
pub mod performance;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;
