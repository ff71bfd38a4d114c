//! Lifecycle events
//!
//! Facts produced by committed state changes, delivered outward by the
//! outbound dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::booking::Booking;
use crate::domain::subscription::Subscription;
use crate::domain::swap_transaction::SwapTransaction;

/// Event types for notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    BookingCreated(BookingEvent),
    BookingConfirmed(BookingEvent),
    BookingCancelled(BookingCancelledEvent),
    BookingCompleted(BookingEvent),
    BookingPaid(BookingEvent),
    BookingDeleted(BookingEvent),
    TransactionCreated(TransactionEvent),
    TransactionSucceeded(TransactionEvent),
    TransactionFailed(TransactionEvent),
    QuotaBreachReported(QuotaBreachEvent),
    SubscriptionCreated(SubscriptionEvent),
    SubscriptionCancelled(SubscriptionEvent),
    SubscriptionExpired(SubscriptionEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::BookingCreated(_) => "booking_created",
            Event::BookingConfirmed(_) => "booking_confirmed",
            Event::BookingCancelled(_) => "booking_cancelled",
            Event::BookingCompleted(_) => "booking_completed",
            Event::BookingPaid(_) => "booking_paid",
            Event::BookingDeleted(_) => "booking_deleted",
            Event::TransactionCreated(_) => "transaction_created",
            Event::TransactionSucceeded(_) => "transaction_succeeded",
            Event::TransactionFailed(_) => "transaction_failed",
            Event::QuotaBreachReported(_) => "quota_breach_reported",
            Event::SubscriptionCreated(_) => "subscription_created",
            Event::SubscriptionCancelled(_) => "subscription_cancelled",
            Event::SubscriptionExpired(_) => "subscription_expired",
        }
    }

    /// Driver (or subscribing user) the event concerns.
    pub fn driver_id(&self) -> &str {
        match self {
            Event::BookingCreated(e)
            | Event::BookingConfirmed(e)
            | Event::BookingCompleted(e)
            | Event::BookingPaid(e)
            | Event::BookingDeleted(e) => &e.driver_id,
            Event::BookingCancelled(e) => &e.driver_id,
            Event::TransactionCreated(e)
            | Event::TransactionSucceeded(e)
            | Event::TransactionFailed(e) => &e.driver_id,
            Event::QuotaBreachReported(e) => &e.driver_id,
            Event::SubscriptionCreated(e)
            | Event::SubscriptionCancelled(e)
            | Event::SubscriptionExpired(e) => &e.user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingEvent {
    pub booking_id: i32,
    pub driver_id: String,
    pub station_id: String,
    pub status: String,
    pub scheduled_time: DateTime<Utc>,
    pub payment_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BookingEvent {
    pub fn from_booking(b: &Booking) -> Self {
        Self {
            booking_id: b.id,
            driver_id: b.driver_id.clone(),
            station_id: b.station_id.clone(),
            status: b.status.as_str().to_string(),
            scheduled_time: b.scheduled_time,
            payment_id: b.payment_id.clone(),
            timestamp: b.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCancelledEvent {
    pub booking_id: i32,
    pub driver_id: String,
    pub station_id: String,
    pub previous_status: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub transaction_id: i32,
    pub booking_id: i32,
    pub driver_id: String,
    pub station_id: String,
    pub old_battery_id: String,
    pub new_battery_id: String,
    pub amount: i64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl TransactionEvent {
    pub fn from_transaction(tx: &SwapTransaction) -> Self {
        Self {
            transaction_id: tx.id,
            booking_id: tx.booking_id,
            driver_id: tx.driver_id.clone(),
            station_id: tx.station_id.clone(),
            old_battery_id: tx.old_battery_id.clone(),
            new_battery_id: tx.new_battery_id.clone(),
            amount: tx.amount,
            status: tx.status.as_str().to_string(),
            timestamp: tx.updated_at,
        }
    }
}

/// A successful swap could not draw from its subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaBreachEvent {
    pub transaction_id: i32,
    pub subscription_id: i32,
    pub driver_id: String,
    /// Machine-readable error kind returned by the ledger
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub subscription_id: i32,
    pub user_id: String,
    pub package_plan_id: i32,
    pub status: String,
    pub used_swaps: i32,
    pub max_swaps: i32,
    pub end_date: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl SubscriptionEvent {
    pub fn from_subscription(s: &Subscription) -> Self {
        Self {
            subscription_id: s.id,
            user_id: s.user_id.clone(),
            package_plan_id: s.package_plan_id,
            status: s.status.as_str().to_string(),
            used_swaps: s.used_swaps,
            max_swaps: s.max_swaps,
            end_date: s.end_date,
            timestamp: s.updated_at,
        }
    }
}

/// Wrapper for events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// A committed state change plus the events it produced.
///
/// Services return this instead of publishing inline, so a delivery
/// failure can never undo a persisted change.
#[derive(Debug, Clone)]
#[must_use = "committed events must be handed to the outbound dispatcher"]
pub struct Committed<T> {
    pub value: T,
    pub events: Vec<Event>,
}

impl<T> Committed<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Committed<U> {
        Committed {
            value: f(self.value),
            events: self.events,
        }
    }

    pub fn into_parts(self) -> (T, Vec<Event>) {
        (self.value, self.events)
    }
}
