//! Application layer
//!
//! Lifecycle services, reconciliation jobs and outbound event delivery.

pub mod events;
pub mod services;

pub use events::{create_event_bus, EventBus, EventSink, EventSubscriber, OutboundDispatcher, SharedEventBus};
pub use services::{
    BookingService, ReconciliationJobs, SubscriptionService, SwapTransactionService,
};
