//! Infrastructure layer - external concerns

pub mod cache;
pub mod crypto;
pub mod database;
pub mod messaging;

pub use cache::{InMemoryTariffCache, RedisTariffCache};
pub use database::{connect_in_memory, init_database, run_migrations};
pub use messaging::{KafkaLogPublisher, NoopChannel, RabbitFanoutPublisher, RecordingChannel};
