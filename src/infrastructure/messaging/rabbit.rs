//! RabbitMQ topic-exchange publisher and the `event.*` relay consumer

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::application::ports::{ChannelError, EventChannel};
use crate::application::relay::relay_record;
use crate::config::RabbitConfig;
use crate::domain::MutationEvent;
use crate::infrastructure::messaging::KafkaLogPublisher;
use crate::shared::ShutdownSignal;

/// Binding pattern that matches every tariff event
pub const RELAY_BINDING: &str = "event.*";

/// Persistent delivery mode
const PERSISTENT: u8 = 2;

fn connection_err(e: lapin::Error) -> ChannelError {
    ChannelError::Connection(e.to_string())
}

struct Session {
    // Held so the connection lives as long as the channel.
    _connection: Connection,
    channel: Channel,
}

async fn open_session(url: &str, exchange: &str) -> Result<Session, ChannelError> {
    let connection = Connection::connect(url, ConnectionProperties::default())
        .await
        .map_err(connection_err)?;
    let channel = connection.create_channel().await.map_err(connection_err)?;
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(connection_err)?;

    Ok(Session {
        _connection: connection,
        channel,
    })
}

/// Publishes each event to a durable topic exchange under the routing key
/// of its action. The AMQP channel is opened on first use and reopened
/// after a failed publish.
pub struct RabbitFanoutPublisher {
    url: String,
    exchange: String,
    session: Mutex<Option<Session>>,
}

impl RabbitFanoutPublisher {
    pub fn new(config: &RabbitConfig) -> Self {
        Self {
            url: config.url.clone(),
            exchange: config.exchange.clone(),
            session: Mutex::new(None),
        }
    }

    /// Open the channel eagerly so misconfiguration shows up at startup.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(open_session(&self.url, &self.exchange).await?);
            info!(exchange = %self.exchange, "Connected to RabbitMQ");
        }
        Ok(())
    }

    async fn channel(&self) -> Result<Channel, ChannelError> {
        let mut session = self.session.lock().await;
        if let Some(s) = session.as_ref() {
            if s.channel.status().connected() {
                return Ok(s.channel.clone());
            }
            warn!("RabbitMQ channel closed, reconnecting");
        }
        let fresh = open_session(&self.url, &self.exchange).await?;
        let channel = fresh.channel.clone();
        *session = Some(fresh);
        Ok(channel)
    }

    async fn publish(&self, channel: &Channel, routing_key: &str, payload: &[u8]) -> lapin::Result<()> {
        channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(PERSISTENT),
            )
            .await?
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventChannel for RabbitFanoutPublisher {
    fn name(&self) -> &'static str {
        "rabbitmq"
    }

    async fn deliver(&self, event: &MutationEvent) -> Result<(), ChannelError> {
        let payload = event.to_json()?;
        let channel = self.channel().await?;

        if let Err(e) = self.publish(&channel, event.routing_key(), &payload).await {
            self.session.lock().await.take();
            return Err(ChannelError::Publish(e.to_string()));
        }
        debug!(routing_key = event.routing_key(), "Published to RabbitMQ");
        Ok(())
    }
}

// ── Relay consumer ─────────────────────────────────────────────

/// Consume every tariff event from the exchange and forward an
/// acknowledgement record to the Kafka relay topic until shutdown.
pub async fn run_relay(
    config: &RabbitConfig,
    kafka: Arc<KafkaLogPublisher>,
    relay_topic: &str,
    shutdown: ShutdownSignal,
) -> Result<(), ChannelError> {
    let session = open_session(&config.url, &config.exchange).await?;
    let channel = &session.channel;

    channel
        .queue_declare(
            &config.relay_queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(connection_err)?;
    channel
        .queue_bind(
            &config.relay_queue,
            &config.exchange,
            RELAY_BINDING,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(connection_err)?;

    let mut consumer = channel
        .basic_consume(
            &config.relay_queue,
            "tariff-relay",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(connection_err)?;

    info!(
        queue = %config.relay_queue,
        exchange = %config.exchange,
        topic = relay_topic,
        "🔁 Relay consuming {}",
        RELAY_BINDING
    );

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                info!("Relay stopping");
                break;
            }
            next = consumer.next() => match next {
                Some(Ok(delivery)) => forward(delivery, &kafka, relay_topic).await,
                Some(Err(e)) => return Err(connection_err(e)),
                None => {
                    warn!("Relay consumer stream ended");
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn forward(delivery: Delivery, kafka: &KafkaLogPublisher, relay_topic: &str) {
    let forwarded = match relay_record(&delivery.data) {
        Ok(record) => match kafka.send_json(relay_topic, &record).await {
            Ok(()) => Ok(record),
            Err(e) => Err(e),
        },
        Err(e) => Err(ChannelError::Publish(e.to_string())),
    };

    let outcome = match forwarded {
        Ok(record) => {
            info!(action = %record.action, tariff_id = ?record.tariff_id, "Relayed event");
            delivery.ack(BasicAckOptions::default()).await
        }
        Err(e) => {
            error!(
                routing_key = delivery.routing_key.as_str(),
                error = %e,
                "Relay failed, requeueing"
            );
            delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await
        }
    };

    if let Err(e) = outcome {
        error!("Failed to settle delivery: {}", e);
    }
}
