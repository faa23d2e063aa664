//! Kafka message bus built on rdkafka. Compiled with the `kafka` feature.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::ports::{BusError, MessageBus};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct KafkaMessageBus {
    producer: FutureProducer,
    brokers: String,
}

impl KafkaMessageBus {
    /// Creates a producer for a comma-separated broker list.
    pub fn new(brokers: &str) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("linger.ms", "10")
            .set("allow.auto.create.topics", "true")
            .create()
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(brokers = %brokers, "Kafka producer created");

        Ok(Self {
            producer,
            brokers: brokers.to_string(),
        })
    }

    /// Builds the producer from `KAFKA_BROKER_URL`. A missing broker list is an
    /// error: events would otherwise be dropped silently.
    pub fn from_config(config: &Config) -> Result<Self, BusError> {
        let brokers = config
            .kafka_broker_url
            .as_deref()
            .ok_or_else(|| BusError::ConnectionFailed("KAFKA_BROKER_URL is not set".to_string()))?;
        Self::new(brokers)
    }

    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

#[async_trait]
impl MessageBus for KafkaMessageBus {
    async fn send(&self, topic: &str, key: &str, payload: &[u8], deadline: Instant) -> Result<(), BusError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(remaining)).await {
            Ok((partition, offset)) => {
                tracing::debug!(topic, key, partition, offset, "Message published to Kafka");
                Ok(())
            }
            Err((kafka_error, _)) => {
                tracing::error!(topic, key, error = %kafka_error, "Failed to publish msg to Kafka");
                Err(BusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }

    async fn close(&self) -> Result<(), BusError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(FLUSH_TIMEOUT)))
            .await
            .map_err(|e| BusError::ConnectionFailed(format!("flush task failed: {e}")))?
            .map_err(|e| BusError::ConnectionFailed(format!("flush failed: {e}")))?;

        tracing::info!(brokers = %self.brokers, "Kafka producer flushed");
        Ok(())
    }
}
