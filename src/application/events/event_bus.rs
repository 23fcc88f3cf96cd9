use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::events::Event;

#[async_trait]
pub trait EventBus: Send + Sync + Clone {
    async fn emit(&self, event: Event);

    fn subscribe(&self) -> broadcast::Receiver<Event>;
}
