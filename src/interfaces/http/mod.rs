//! HTTP REST API
//!
//! - `common`: response envelope, pagination, error mapping, validated JSON
//! - `middleware`: operator API-key check
//! - `modules`: per-resource DTOs and handlers
//! - `router`: route table and Swagger documentation

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;

pub use common::{ApiResponse, PaginatedResponse};
pub use router::{create_api_router, ApiDoc, ApiState};
