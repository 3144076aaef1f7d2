mod simulator;

pub use simulator::{ExecutionOutcome, SimulatedExecutor};
