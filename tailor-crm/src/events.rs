//! Change notifications between components
//!
//! Directories and the ledger publish an [`AppEvent`] after every successful
//! mutation; dependents subscribe and re-fetch what they display.

use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    ShopsChanged,
    CustomersChanged,
    BillsChanged,
}

/// Publish/subscribe channel shared by all components
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn publish(&self, event: AppEvent) {
        match self.tx.send(event) {
            Ok(receivers) => tracing::debug!("Published {:?} to {} subscriber(s)", event, receivers),
            Err(_) => tracing::trace!("Published {:?} with no subscribers", event),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(AppEvent::ShopsChanged);

        assert_eq!(first.recv().await.unwrap(), AppEvent::ShopsChanged);
        assert_eq!(second.recv().await.unwrap(), AppEvent::ShopsChanged);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(AppEvent::BillsChanged);
    }
}
