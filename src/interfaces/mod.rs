//! Inbound adapters: REST API and the event WebSocket

pub mod http;
pub mod ws;
