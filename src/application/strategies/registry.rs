use super::{DecisionStrategy, MeanReversionStrategy, MomentumStrategy};
use crate::domain::dna::StrategyKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each strategy kind tag to its implementation.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, Arc<dyn DecisionStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MomentumStrategy));
        registry.register(Arc::new(MeanReversionStrategy));
        registry
    }

    /// Register (or replace) the implementation for `strategy.kind()`.
    pub fn register(&mut self, strategy: Arc<dyn DecisionStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: StrategyKind) -> Option<Arc<dyn DecisionStrategy>> {
        self.strategies.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
