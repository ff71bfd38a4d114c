//! Booking module: reservation of swap slots

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
