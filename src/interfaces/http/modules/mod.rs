pub mod bookings;
pub mod health;
pub mod metrics;
pub mod reconciliation;
pub mod request_id;
pub mod subscriptions;
pub mod transactions;
