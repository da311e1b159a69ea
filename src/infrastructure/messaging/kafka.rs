//! Kafka log-topic publisher
//!
//! Events are buffered per topic and produced in batches of `batch_size`
//! records. Whatever is left is produced on `flush`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::ports::{ChannelError, EventChannel};
use crate::config::KafkaConfig;
use crate::domain::MutationEvent;

fn connection_err(e: rskafka::client::error::Error) -> ChannelError {
    ChannelError::Connection(e.to_string())
}

fn publish_err(e: rskafka::client::error::Error) -> ChannelError {
    ChannelError::Publish(e.to_string())
}

fn record(value: Vec<u8>) -> Record {
    Record {
        key: None,
        value: Some(value),
        headers: BTreeMap::new(),
        timestamp: Utc::now(),
    }
}

pub struct KafkaLogPublisher {
    client: Client,
    topic: String,
    batch_size: usize,
    partitions: Mutex<HashMap<String, Arc<PartitionClient>>>,
    buffers: Mutex<HashMap<String, Vec<Record>>>,
}

impl KafkaLogPublisher {
    /// Connect to the bootstrap brokers and make sure the event topic exists.
    pub async fn connect(config: &KafkaConfig) -> Result<Self, ChannelError> {
        let brokers = config.broker_list();
        let client = ClientBuilder::new(brokers.clone())
            .build()
            .await
            .map_err(connection_err)?;
        info!(brokers = ?brokers, "Connected to Kafka");

        let publisher = Self {
            client,
            topic: config.topic.clone(),
            batch_size: config.batch_size.max(1),
            partitions: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
        };
        publisher
            .ensure_topic(&config.topic, config.replication_factor)
            .await?;
        Ok(publisher)
    }

    pub async fn ensure_topic(&self, topic: &str, replication_factor: i16) -> Result<(), ChannelError> {
        let topics = self.client.list_topics().await.map_err(connection_err)?;
        if topics.iter().any(|t| t.name == topic) {
            return Ok(());
        }

        let controller = self.client.controller_client().map_err(connection_err)?;
        match controller.create_topic(topic, 1, replication_factor, 5_000).await {
            Ok(()) => info!(topic, "Kafka topic created"),
            // Another producer may have created it in between.
            Err(e) => warn!(topic, error = %e, "Kafka topic creation failed"),
        }
        Ok(())
    }

    async fn partition(&self, topic: &str) -> Result<Arc<PartitionClient>, ChannelError> {
        let mut partitions = self.partitions.lock().await;
        if let Some(client) = partitions.get(topic) {
            return Ok(client.clone());
        }
        let client = Arc::new(
            self.client
                .partition_client(topic, 0, UnknownTopicHandling::Retry)
                .await
                .map_err(connection_err)?,
        );
        partitions.insert(topic.to_string(), client.clone());
        Ok(client)
    }

    async fn produce(&self, topic: &str, records: Vec<Record>) -> Result<(), ChannelError> {
        if records.is_empty() {
            return Ok(());
        }
        let count = records.len();
        self.partition(topic)
            .await?
            .produce(records, Compression::default())
            .await
            .map_err(publish_err)?;
        debug!(topic, count, "Produced Kafka batch");
        Ok(())
    }

    /// Append a JSON record to the topic buffer, producing the buffer once
    /// it holds `batch_size` records. If producing fails the new record is
    /// dropped and the earlier ones stay buffered.
    pub async fn append(&self, topic: &str, value: Vec<u8>) -> Result<(), ChannelError> {
        let mut buffers = self.buffers.lock().await;
        let buffer = buffers.entry(topic.to_string()).or_default();

        if buffer.len() + 1 < self.batch_size {
            buffer.push(record(value));
            return Ok(());
        }

        let mut batch = std::mem::take(buffer);
        let earlier = batch.len();
        batch.push(record(value));

        if let Err(e) = self.produce(topic, batch.clone()).await {
            batch.truncate(earlier);
            *buffers.entry(topic.to_string()).or_default() = batch;
            return Err(e);
        }
        Ok(())
    }

    /// Produce a single record immediately, bypassing the buffer.
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        value: &T,
    ) -> Result<(), ChannelError> {
        let payload = serde_json::to_vec(value)?;
        self.produce(topic, vec![record(payload)]).await
    }
}

#[async_trait]
impl EventChannel for KafkaLogPublisher {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn deliver(&self, event: &MutationEvent) -> Result<(), ChannelError> {
        let payload = event.to_json()?;
        self.append(&self.topic, payload).await
    }

    async fn flush(&self) -> Result<(), ChannelError> {
        let pending: Vec<(String, Vec<Record>)> = {
            let mut buffers = self.buffers.lock().await;
            buffers.drain().filter(|(_, records)| !records.is_empty()).collect()
        };

        let mut first_error = None;
        for (topic, records) in pending {
            let count = records.len();
            match self.produce(&topic, records).await {
                Ok(()) => info!(topic = %topic, count, "Flushed Kafka buffer"),
                Err(e) => {
                    warn!(topic = %topic, count, error = %e, "Dropping unflushed Kafka records");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
