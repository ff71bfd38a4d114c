//! Application events (pub/sub and outbound delivery)
//!
//! Event types are defined in `domain::events`. The `EventBus`
//! (broadcast channel) and the `OutboundDispatcher` live here.

pub mod event_bus;
pub mod outbound;

pub use crate::domain::events::types;
pub use crate::domain::events::types::*;

pub use event_bus::{create_event_bus, EventBus, EventSubscriber, SharedEventBus};
pub use outbound::{DeliveryError, EventSink, OutboundDispatcher};
