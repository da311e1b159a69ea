//! HTTP REST API
//!
//! - `common`: response envelope, pagination, error mapping, `ValidatedJson`
//! - `middleware`: bearer token authentication
//! - `modules`: handlers per resource
//! - `router`: API router with Swagger documentation

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;

pub use common::{ApiResponse, PaginatedResponse, PaginationParams};
pub use router::{create_api_router, ApiDoc, RouterDeps};
