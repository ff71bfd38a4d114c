//! Outbound event delivery
//!
//! Services hand back committed events; handlers and jobs enqueue them here.
//! A background worker drains the queue and delivers every message to each
//! registered sink with exponential backoff. Delivery is at-least-once per
//! sink and never blocks or fails the request that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::types::{Committed, Event, EventMessage};
use crate::shared::shutdown::ShutdownSignal;
use crate::shared::utills::retry::{retry_with_backoff, RetryConfig};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("transient delivery failure: {0}")]
    Transient(String),

    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A consumer of lifecycle events (notification transport, audit log, ...)
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, message: &EventMessage) -> Result<(), DeliveryError>;
}

/// Queue handle. Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct OutboundDispatcher {
    sender: mpsc::UnboundedSender<EventMessage>,
}

impl OutboundDispatcher {
    /// Spawn the delivery worker.
    ///
    /// The worker stops after the shutdown signal fires and the queue has
    /// been drained, or when every dispatcher handle is dropped.
    pub fn start(
        sinks: Vec<Arc<dyn EventSink>>,
        retry: RetryConfig,
        shutdown: ShutdownSignal,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(receiver, sinks, retry, shutdown));
        (Self { sender }, handle)
    }

    pub fn dispatch(&self, events: Vec<Event>) {
        for event in events {
            let message = EventMessage::new(event);
            let event_type = message.event.event_type();
            if self.sender.send(message).is_err() {
                error!(event_type, "Outbound worker stopped, event dropped");
                metrics::counter!("outbound_delivery_failures_total", "sink" => "queue")
                    .increment(1);
            }
        }
    }

    /// Enqueue the events of a committed change and return its value.
    pub fn emit<T>(&self, committed: Committed<T>) -> T {
        let (value, events) = committed.into_parts();
        self.dispatch(events);
        value
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<EventMessage>,
    sinks: Vec<Arc<dyn EventSink>>,
    retry: RetryConfig,
    shutdown: ShutdownSignal,
) {
    info!(sinks = sinks.len(), "📤 Outbound dispatcher started");

    loop {
        tokio::select! {
            message = receiver.recv() => {
                match message {
                    Some(message) => deliver_to_all(&sinks, &retry, &message).await,
                    None => break,
                }
            }
            _ = shutdown.notified().wait() => {
                // Flush whatever was committed before shutdown.
                receiver.close();
                while let Some(message) = receiver.recv().await {
                    deliver_to_all(&sinks, &retry, &message).await;
                }
                break;
            }
        }
    }

    info!("📤 Outbound dispatcher stopped");
}

async fn deliver_to_all(sinks: &[Arc<dyn EventSink>], retry: &RetryConfig, message: &EventMessage) {
    let event_type = message.event.event_type();
    for sink in sinks {
        let target: &dyn EventSink = sink.as_ref();
        let result = retry_with_backoff(
            retry.clone(),
            move || target.deliver(message),
            DeliveryError::is_retryable,
            "deliver_event",
        )
        .await;

        match result {
            Ok(()) => debug!(sink = sink.name(), event_type, message_id = %message.id, "Event delivered"),
            Err(e) => {
                error!(
                    sink = sink.name(),
                    event_type,
                    message_id = %message.id,
                    error = %e,
                    "Event delivery failed"
                );
                metrics::counter!("outbound_delivery_failures_total", "sink" => sink.name().to_string())
                    .increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::BookingEvent;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<String>>,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, message: &EventMessage) -> Result<(), DeliveryError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(DeliveryError::Transient("broker unavailable".into()));
            }
            self.seen.lock().await.push(message.event.event_type().to_string());
            Ok(())
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(5),
        }
    }

    fn paid_event() -> Event {
        Event::BookingPaid(BookingEvent {
            booking_id: 1,
            driver_id: "driver-1".into(),
            station_id: "station-1".into(),
            status: "CONFIRM".into(),
            scheduled_time: Utc::now(),
            payment_id: None,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let sink = Arc::new(RecordingSink {
            failures_left: AtomicU32::new(2),
            ..Default::default()
        });
        let shutdown = ShutdownSignal::new();
        let (dispatcher, handle) =
            OutboundDispatcher::start(vec![sink.clone() as Arc<dyn EventSink>], fast_retry(), shutdown.clone());

        let value = dispatcher.emit(Committed::new(7).with_event(paid_event()));
        assert_eq!(value, 7);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();

        assert_eq!(*sink.seen.lock().await, vec!["booking_paid".to_string()]);
    }

    #[tokio::test]
    async fn worker_stops_when_all_handles_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, handle) =
            OutboundDispatcher::start(vec![sink.clone() as Arc<dyn EventSink>], fast_retry(), ShutdownSignal::new());
        dispatcher.dispatch(vec![paid_event(), paid_event()]);
        drop(dispatcher);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert_eq!(sink.seen.lock().await.len(), 2);
    }
}
