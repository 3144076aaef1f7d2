pub mod event_bus;
pub mod observability;
pub mod persistence;
pub mod repositories;
pub mod simulation;

pub use event_bus::EventBus;
pub use persistence::SqliteAgentStore;
pub use repositories::InMemoryAgentStore;
