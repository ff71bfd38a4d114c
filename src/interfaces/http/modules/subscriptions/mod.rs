//! Package plans, subscriptions and per-user subscription views

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
