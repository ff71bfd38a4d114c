//! Domain events
//!
//! Event types that represent facts about what happened in the system.
//! The EventBus and outbound dispatcher live in `application::events`.

pub mod types;

pub use types::{
    BookingCancelledEvent, BookingEvent, Committed, Event, EventMessage, QuotaBreachEvent,
    SubscriptionEvent, TransactionEvent,
};
