//! Capability traits the orchestration core depends on.
//! Each has a production adapter and an in-memory double under `crate::adapters`.

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::{Gateway, NewTransaction, Transaction};

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Transaction not found: {0}")]
    NotFound(i64),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gateway {gateway_id} rejected transaction {transaction_id}: {reason}")]
    Rejected {
        gateway_id: i32,
        transaction_id: i64,
        reason: String,
    },
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),
}

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Failed to publish to {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },
    #[error("Message bus connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Message bus is closed")]
    Closed,
}

/// Source of gateways eligible for a country. Order of the result is irrelevant.
#[async_trait]
pub trait GatewayDirectory: Send + Sync {
    async fn gateways_for_country(&self, country_id: i32) -> Result<Vec<Gateway>, DirectoryError>;
}

/// Durable transaction storage. Implementations must never hand out the same id twice.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, tx: NewTransaction) -> StoreResult<Transaction>;

    /// Re-applying the status a record already has is a no-op in effect.
    async fn update_status(&self, id: i64, status: &str) -> StoreResult<()>;

    async fn get_by_id(&self, id: i64) -> StoreResult<Transaction>;
}

/// Delivery of a persisted transaction to the gateway named by `tx.gateway_id`.
#[async_trait]
pub trait DispatchClient: Send + Sync {
    async fn send(&self, tx: &Transaction) -> Result<(), DispatchError>;
}

/// Wire-level message bus driver.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        deadline: Instant,
    ) -> Result<(), BusError>;

    async fn close(&self) -> Result<(), BusError>;
}
