pub mod market_feed;
pub mod slippage_model;

pub use market_feed::RandomWalkMarketFeed;
pub use slippage_model::{SlippageModel, VolatilitySlippage, ZeroSlippage};
