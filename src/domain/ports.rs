use crate::domain::agent::Agent;
use crate::domain::market::MarketState;
use anyhow::Result;
use async_trait::async_trait;

/// Supplies the market snapshot an agent decides on. The current
/// deployment uses a stochastic simulation; a real price feed slots in
/// behind the same trait.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn snapshot(&self, agent: &Agent) -> Result<MarketState>;
}
