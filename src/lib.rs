//! # Tariff Service
//!
//! REST backend for insurance tariffs. Tariffs are stored through SeaORM,
//! read through a Redis cache, and every mutation is fanned out as an
//! event to a Kafka log topic and a RabbitMQ topic exchange.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Tariff and user entities, repository traits, events
//! - **application**: The tariff workflow, cache and channel ports, event dispatch
//! - **infrastructure**: SeaORM store, Redis cache, Kafka and RabbitMQ channels, crypto
//! - **interfaces**: REST API with Swagger documentation
//! - **server**: Wiring and lifecycle
//! - **shared**: Retry and shutdown utilities

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};
pub use interfaces::http::create_api_router;
pub use server::{ServerHandle, ServerOptions};
