mod execution_scheduler;

pub use execution_scheduler::{CycleOutcome, ExecutionScheduler, TickReport};
