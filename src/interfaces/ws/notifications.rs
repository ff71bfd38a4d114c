//! Event stream over WebSocket
//!
//! `GET /api/v1/events/ws?driver_id=..&event_types=booking_created,transaction_succeeded`
//! Each matching `EventMessage` is sent as one JSON text frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::application::events::{EventMessage, SharedEventBus};

/// Subscriber-side filter
#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    /// Only events concerning this driver (or subscription user)
    pub driver_id: Option<String>,
    /// Comma-separated snake_case event types
    pub event_types: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, message: &EventMessage) -> bool {
        if let Some(driver_id) = &self.driver_id {
            if message.event.driver_id() != driver_id {
                return false;
            }
        }
        if let Some(types) = &self.event_types {
            let wanted = message.event.event_type();
            if !types.split(',').map(str::trim).any(|t| t == wanted) {
                return false;
            }
        }
        true
    }
}

#[derive(Clone)]
pub struct NotificationState {
    pub event_bus: SharedEventBus,
}

pub async fn ws_notifications_handler(
    ws: WebSocketUpgrade,
    State(state): State<NotificationState>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    info!(
        driver_id = ?filter.driver_id,
        event_types = ?filter.event_types,
        "New event stream connection"
    );
    ws.on_upgrade(move |socket| stream_events(socket, state, filter))
}

async fn stream_events(socket: WebSocket, state: NotificationState, filter: EventFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscriber = state.event_bus.subscribe();

    let welcome = serde_json::json!({
        "type": "connected",
        "message": "Connected to event stream",
        "filter": {
            "driver_id": filter.driver_id,
            "event_types": filter.event_types,
        }
    });
    if let Err(e) = sender.send(Message::Text(welcome.to_string().into())).await {
        error!("Failed to send welcome message: {}", e);
        return;
    }

    loop {
        select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("Event stream socket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },

            event = subscriber.recv() => {
                let Some(message) = event else {
                    warn!("Event bus closed");
                    break;
                };
                if !filter.matches(&message) {
                    continue;
                }
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if let Err(e) = sender.send(Message::Text(json.into())).await {
                            debug!("Event stream client went away: {}", e);
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize event: {}", e),
                }
            }
        }
    }

    info!("Event stream connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{BookingCancelledEvent, Event, SubscriptionEvent};
    use chrono::Utc;

    fn cancelled(driver: &str) -> EventMessage {
        EventMessage::new(Event::BookingCancelled(BookingCancelledEvent {
            booking_id: 1,
            driver_id: driver.into(),
            station_id: "ST-1".into(),
            previous_status: "PENDING".into(),
            reason: "changed plans".into(),
            timestamp: Utc::now(),
        }))
    }

    #[test]
    fn empty_filter_passes_everything() {
        assert!(EventFilter::default().matches(&cancelled("driver-1")));
    }

    #[test]
    fn driver_filter_uses_subscription_user_too() {
        let filter = EventFilter {
            driver_id: Some("driver-1".into()),
            event_types: None,
        };
        assert!(filter.matches(&cancelled("driver-1")));
        assert!(!filter.matches(&cancelled("driver-2")));

        let expired = EventMessage::new(Event::SubscriptionExpired(SubscriptionEvent {
            subscription_id: 3,
            user_id: "driver-1".into(),
            package_plan_id: 1,
            status: "EXPIRED".into(),
            used_swaps: 4,
            max_swaps: 10,
            end_date: Utc::now(),
            timestamp: Utc::now(),
        }));
        assert!(filter.matches(&expired));
    }

    #[test]
    fn event_type_list_tolerates_spaces() {
        let filter = EventFilter {
            driver_id: None,
            event_types: Some("booking_created, booking_cancelled".into()),
        };
        assert!(filter.matches(&cancelled("driver-1")));

        let filter = EventFilter {
            driver_id: None,
            event_types: Some("transaction_failed".into()),
        };
        assert!(!filter.matches(&cancelled("driver-1")));
    }
}
