pub mod event_bus;
pub mod broadcast_event_bus;

// Re-export Event from root events module for convenience
pub use crate::events::Event;
pub use event_bus::EventBus;
pub use broadcast_event_bus::BroadcastEventBus;
