//! Transaction event publication.
//!
//! The payload's data format picks the topic. Once the topic resolves, each
//! attempt runs inside the shared circuit breaker and the attempts are bounded by
//! a retry policy and the caller's deadline. An unknown format fails straight
//! away without touching the breaker.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::FormatRoute;
use crate::ports::{BusError, MessageBus};
use crate::resilience::{CircuitBreaker, CircuitBreakerError, RetryPolicy};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("unsupported data format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Breaker(#[from] CircuitBreakerError<BusError>),
    #[error("publish deadline exceeded")]
    DeadlineExceeded,
    #[error("failed to close message bus: {0}")]
    Close(BusError),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        transaction_id: i64,
        payload: &[u8],
        data_format: &str,
        deadline: Instant,
    ) -> Result<(), PublishError>;

    /// Releases the underlying bus connection.
    async fn close(&self) -> Result<(), PublishError>;
}

/// Publisher wrapping a [`MessageBus`] in retry + circuit breaker.
///
/// The breaker is injected so a single instance can be shared for the
/// process lifetime and inspected elsewhere (health reporting).
#[derive(Clone)]
pub struct ResilientPublisher {
    bus: Arc<dyn MessageBus>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilientPublisher {
    pub fn new(bus: Arc<dyn MessageBus>, breaker: CircuitBreaker, retry: RetryPolicy) -> Self {
        Self { bus, breaker, retry }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl EventPublisher for ResilientPublisher {
    async fn publish(
        &self,
        transaction_id: i64,
        payload: &[u8],
        data_format: &str,
        deadline: Instant,
    ) -> Result<(), PublishError> {
        let topic = FormatRoute::for_content_type(data_format)
            .map(|route| route.topic)
            .ok_or_else(|| PublishError::UnsupportedFormat(data_format.to_string()))?;
        let key = transaction_id.to_string();

        let attempts = self.retry.run("publish_transaction", || {
            let bus = Arc::clone(&self.bus);
            let key = key.as_str();
            self.breaker
                .call(move || async move { bus.send(topic, key, payload, deadline).await })
        });

        match tokio::time::timeout_at(deadline, attempts).await {
            Ok(Ok(())) => {
                tracing::info!(transaction_id, topic, "Transaction event published");
                Ok(())
            }
            Ok(Err(e)) => Err(PublishError::Breaker(e)),
            Err(_) => {
                tracing::error!(transaction_id, topic, breaker = self.breaker.name(), "Publish deadline exceeded");
                Err(PublishError::DeadlineExceeded)
            }
        }
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.bus.close().await.map_err(PublishError::Close)
    }
}
