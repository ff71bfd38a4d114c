//! Swap transaction module: the physical battery exchange ledger

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
