mod mean_reversion;
mod momentum;
mod registry;
mod traits;

pub use mean_reversion::MeanReversionStrategy;
pub use momentum::MomentumStrategy;
pub use registry::StrategyRegistry;
pub use traits::{Decision, DecisionStrategy};
