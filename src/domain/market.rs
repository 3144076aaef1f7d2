use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the market and the agent's wallet, as handed to a
/// decision strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub symbol: String,
    pub price: Decimal,
    /// Squashed rate of change over the agent's momentum window, in (-1, 1).
    pub momentum: f64,
    /// Distance of the price from its rolling mean, in standard deviations.
    pub z_score: f64,
    /// Holdings of the traded asset.
    pub base_balance: Decimal,
    /// Holdings of the quote currency.
    pub quote_balance: Decimal,
    pub timestamp: DateTime<Utc>,
}
