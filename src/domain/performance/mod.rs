pub mod fitness;

pub use fitness::{FitnessInputs, NEUTRAL_FITNESS, fitness};
