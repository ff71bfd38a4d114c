//! # Battery Swap Service
//!
//! Booking, swap transaction and subscription lifecycle coordinator for
//! battery-swap stations.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Aggregates, transition tables, events and repository traits
//! - **application**: Lifecycle services, reconciliation jobs, outbound delivery
//! - **infrastructure**: SeaORM storage, in-memory storage, API key hashing
//! - **interfaces**: REST API with Swagger documentation and the event WebSocket
//! - **server**: Process bootstrap and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{config_path_from_env, default_config_path, AppConfig};

pub use infrastructure::{init_database, DatabaseConfig, InMemoryRepositoryProvider, SeaOrmRepositoryProvider};

pub use interfaces::http::{create_api_router, ApiDoc, ApiState};

pub use application::{create_event_bus, EventBus, SharedEventBus};
pub use domain::{Event, EventMessage};
