use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use super::event_bus::EventBus;
use crate::events::Event;

#[derive(Clone)]
pub struct BroadcastEventBus {
    tx: broadcast::Sender<Event>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn new_default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn emit(&self, event: Event) {
        trace!(?event, "emitting event");
        let _ = self.tx.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
