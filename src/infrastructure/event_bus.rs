use crate::domain::events::{DomainEvent, EventListener};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Fans domain events (`agent.updated`, `transaction.new`,
/// `generation.completed`) out to every subscribed listener. Clones share
/// the listener list.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Deliver `event` to every listener in subscription order. Listeners
    /// run inline, so a slow one delays the publishing cycle.
    pub async fn publish(&self, event: DomainEvent) {
        let listeners = self.listeners.read().await;
        if listeners.is_empty() {
            return;
        }
        debug!(
            "EventBus: {} -> {} listener(s)",
            event.name(),
            listeners.len()
        );
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}
