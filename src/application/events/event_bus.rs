//! Event Bus for broadcasting events to live subscribers
//!
//! Registered with the outbound dispatcher as the built-in sink; the
//! WebSocket event stream subscribes here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::outbound::{DeliveryError, EventSink};
use super::types::{Event, EventMessage};

const DEFAULT_CAPACITY: usize = 1024;

/// Event bus for broadcasting events to all subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, event: Event) {
        self.publish_message(EventMessage::new(event));
    }

    /// Publish an already-stamped message, keeping its id.
    pub fn publish_message(&self, message: EventMessage) {
        let event_type = message.event.event_type();
        let driver_id = message.event.driver_id().to_string();

        match self.sender.send(message) {
            Ok(count) => {
                debug!(event_type, driver_id, subscribers = count, "Event published");
            }
            Err(_) => {
                debug!(event_type, driver_id, "Event published (no subscribers)");
            }
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        let receiver = self.sender.subscribe();
        let count = self.subscriber_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(total = count, "New event subscriber");

        EventSubscriber {
            receiver,
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for EventBus {
    fn name(&self) -> &str {
        "event_bus"
    }

    async fn deliver(&self, message: &EventMessage) -> Result<(), DeliveryError> {
        self.publish_message(message.clone());
        Ok(())
    }
}

/// Event subscriber that receives events from the bus
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventSubscriber {
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(missed = count, "Subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return None;
                }
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        let prev = self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        info!(remaining = prev.saturating_sub(1), "Event subscriber disconnected");
    }
}

/// Shared event bus type
pub type SharedEventBus = Arc<EventBus>;

/// Create a shared event bus
pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::SubscriptionEvent;
    use chrono::Utc;

    fn sample_event() -> Event {
        Event::SubscriptionExpired(SubscriptionEvent {
            subscription_id: 1,
            user_id: "user-1".into(),
            package_plan_id: 1,
            status: "EXPIRED".into(),
            used_swaps: 0,
            max_swaps: 4,
            end_date: Utc::now(),
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(sample_event());
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.event.event_type(), "subscription_expired");

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn sink_delivery_keeps_message_id() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let msg = EventMessage::new(sample_event());
        bus.deliver(&msg).await.unwrap();
        assert_eq!(sub.recv().await.unwrap().id, msg.id);
    }
}
