//! Event channels: Kafka log topic, RabbitMQ topic exchange, in-process

pub mod kafka;
pub mod memory;
pub mod rabbit;

pub use kafka::KafkaLogPublisher;
pub use memory::{NoopChannel, RecordingChannel};
pub use rabbit::{run_relay, RabbitFanoutPublisher, RELAY_BINDING};
