//! WebSocket interfaces
//!
//! - `notifications`: live lifecycle event stream for dashboards and drivers

pub mod notifications;

pub use notifications::{ws_notifications_handler, EventFilter, NotificationState};
