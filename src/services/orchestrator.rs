//! End-to-end transaction flow: validate, select a gateway, persist, dispatch
//! with retry, then publish the transaction event.
//!
//! A publish failure is reported to the caller while the transaction stays
//! persisted as `pending`; nothing is rolled back.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::{
    NewTransaction, TransactionRequest, TransactionResponse, TransactionType,
    CONTENT_TYPE_JSON, STATUS_FAILED,
};
use crate::ports::{DispatchClient, DispatchError, StoreError, TransactionStore};
use crate::resilience::RetryPolicy;
use crate::services::gateway_selector::{GatewaySelector, SelectionError};
use crate::services::publisher::{EventPublisher, PublishError};

/// Stable error classification for callers that map errors to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidAmount,
    InvalidUser,
    NoGatewayAvailable,
    AllGatewaysUnhealthy,
    DirectoryError,
    PersistenceFailed,
    DispatchFailed,
    CompensationFailed,
    SerializationFailed,
    PublishFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::InvalidUser => "invalid_user",
            ErrorKind::NoGatewayAvailable => "no_gateway_available",
            ErrorKind::AllGatewaysUnhealthy => "all_gateways_unhealthy",
            ErrorKind::DirectoryError => "directory_error",
            ErrorKind::PersistenceFailed => "persistence_failed",
            ErrorKind::DispatchFailed => "dispatch_failed",
            ErrorKind::CompensationFailed => "compensation_failed",
            ErrorKind::SerializationFailed => "serialization_failed",
            ErrorKind::PublishFailed => "publish_failed",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ErrorKind::InvalidAmount | ErrorKind::InvalidUser)
    }
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("invalid amount, must be greater than zero")]
    InvalidAmount,

    #[error("invalid user_id, must be a positive integer")]
    InvalidUser,

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("failed to persist transaction: {0}")]
    PersistenceFailed(#[source] StoreError),

    #[error("failed to send tx {transaction_id} to gateway: {source}")]
    DispatchFailed {
        transaction_id: i64,
        #[source]
        source: DispatchError,
    },

    /// Dispatch failed and the record could not be marked `failed`; it remains
    /// `pending` although delivery is known to have failed.
    #[error(
        "failed to send tx {transaction_id} to gateway ({dispatch}) and failed to mark it failed ({status_update})"
    )]
    CompensationFailed {
        transaction_id: i64,
        dispatch: DispatchError,
        status_update: StoreError,
    },

    #[error("failed to serialize tx {transaction_id}: {source}")]
    SerializationFailed {
        transaction_id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to publish tx {transaction_id}: {source}")]
    PublishFailed {
        transaction_id: i64,
        #[source]
        source: PublishError,
    },
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::InvalidAmount => ErrorKind::InvalidAmount,
            TransactionError::InvalidUser => ErrorKind::InvalidUser,
            TransactionError::Selection(SelectionError::NoGatewayAvailable) => ErrorKind::NoGatewayAvailable,
            TransactionError::Selection(SelectionError::AllGatewaysUnhealthy) => ErrorKind::AllGatewaysUnhealthy,
            TransactionError::Selection(SelectionError::Directory(_)) => ErrorKind::DirectoryError,
            TransactionError::PersistenceFailed(_) => ErrorKind::PersistenceFailed,
            TransactionError::DispatchFailed { .. } => ErrorKind::DispatchFailed,
            TransactionError::CompensationFailed { .. } => ErrorKind::CompensationFailed,
            TransactionError::SerializationFailed { .. } => ErrorKind::SerializationFailed,
            TransactionError::PublishFailed { .. } => ErrorKind::PublishFailed,
        }
    }
}

#[derive(Clone)]
pub struct TransactionOrchestrator {
    store: Arc<dyn TransactionStore>,
    dispatch: Arc<dyn DispatchClient>,
    publisher: Arc<dyn EventPublisher>,
    dispatch_retry: RetryPolicy,
    compensation_retry: RetryPolicy,
    publish_timeout: Duration,
}

impl TransactionOrchestrator {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        dispatch: Arc<dyn DispatchClient>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            dispatch,
            publisher,
            dispatch_retry: RetryPolicy::default(),
            compensation_retry: RetryPolicy::exponential(3),
            publish_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_dispatch_retry(mut self, policy: RetryPolicy) -> Self {
        self.dispatch_retry = policy;
        self
    }

    #[must_use]
    pub fn with_compensation_retry(mut self, policy: RetryPolicy) -> Self {
        self.compensation_retry = policy;
        self
    }

    #[must_use]
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Handles a deposit or withdrawal.
    ///
    /// Persistence happens before dispatch, and dispatch before publish. If
    /// publishing fails the caller gets an error but the transaction stays
    /// persisted as `pending`.
    pub async fn process_transaction(
        &self,
        request: &TransactionRequest,
        selector: &dyn GatewaySelector,
        transaction_type: TransactionType,
    ) -> Result<TransactionResponse, TransactionError> {
        if request.amount <= BigDecimal::from(0_i64) {
            return Err(TransactionError::InvalidAmount);
        }
        if request.user_id <= 0 {
            return Err(TransactionError::InvalidUser);
        }

        let gateway = selector.select(request.country_id).await?;

        let new_tx = NewTransaction::pending(
            request.amount.clone(),
            transaction_type,
            request.user_id,
            gateway.id,
            request.country_id,
        );
        let tx = self.store.create(new_tx).await.map_err(|e| {
            tracing::error!(user_id = request.user_id, gateway_id = gateway.id, error = %e, "Failed to save tx to database");
            TransactionError::PersistenceFailed(e)
        })?;

        tracing::info!(
            transaction_id = tx.id,
            gateway_id = tx.gateway_id,
            transaction_type = %transaction_type,
            "Transaction persisted"
        );

        let dispatched = self
            .dispatch_retry
            .run("dispatch_transaction", || self.dispatch.send(&tx))
            .await;

        if let Err(dispatch) = dispatched {
            return Err(self.compensate(tx.id, dispatch).await);
        }

        let payload = serde_json::to_vec(&tx).map_err(|source| {
            tracing::error!(transaction_id = tx.id, error = %source, "Failed to marshal tx for publishing");
            TransactionError::SerializationFailed {
                transaction_id: tx.id,
                source,
            }
        })?;

        let deadline = Instant::now() + self.publish_timeout;
        self.publisher
            .publish(tx.id, &payload, CONTENT_TYPE_JSON, deadline)
            .await
            .map_err(|source| {
                tracing::error!(transaction_id = tx.id, error = %source, "Failed to publish tx");
                TransactionError::PublishFailed {
                    transaction_id: tx.id,
                    source,
                }
            })?;

        Ok(TransactionResponse::accepted(&tx))
    }

    /// Marks a transaction whose dispatch was exhausted as `failed`.
    async fn compensate(&self, transaction_id: i64, dispatch: DispatchError) -> TransactionError {
        let updated = self
            .compensation_retry
            .run("mark_transaction_failed", || {
                self.store.update_status(transaction_id, STATUS_FAILED)
            })
            .await;

        match updated {
            Ok(()) => {
                tracing::warn!(transaction_id, error = %dispatch, "Dispatch failed, transaction marked failed");
                TransactionError::DispatchFailed {
                    transaction_id,
                    source: dispatch,
                }
            }
            Err(status_update) => {
                tracing::error!(
                    transaction_id,
                    dispatch_error = %dispatch,
                    status_update_error = %status_update,
                    "Dispatch failed and transaction is still pending; needs reconciliation"
                );
                TransactionError::CompensationFailed {
                    transaction_id,
                    dispatch,
                    status_update,
                }
            }
        }
    }

    /// Applies a status reported out-of-band by the gateway or an operator.
    /// The value is stored as given.
    pub async fn process_callback(&self, transaction_id: i64, status: &str) -> Result<(), TransactionError> {
        self.store
            .update_status(transaction_id, status)
            .await
            .map_err(|e| {
                tracing::error!(transaction_id, status, error = %e, "Failed to update transaction status in database");
                TransactionError::PersistenceFailed(e)
            })?;

        tracing::info!(transaction_id, status, "Transaction status updated from callback");
        Ok(())
    }
}
