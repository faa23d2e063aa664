use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::domain::Transaction;
use crate::ports::{DispatchClient, DispatchError};

/// Delivers transactions to gateways over HTTP.
///
/// Each transaction is POSTed as JSON to `{base_url}/gateways/{gateway_id}/transactions`.
/// Any non-2xx answer is a rejection.
#[derive(Clone)]
pub struct HttpDispatchClient {
    client: Client,
    base_url: String,
}

impl HttpDispatchClient {
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();

        HttpDispatchClient { client, base_url }
    }

    fn endpoint(&self, gateway_id: i32) -> String {
        format!(
            "{}/gateways/{}/transactions",
            self.base_url.trim_end_matches('/'),
            gateway_id
        )
    }
}

#[async_trait]
impl DispatchClient for HttpDispatchClient {
    async fn send(&self, tx: &Transaction) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(self.endpoint(tx.gateway_id))
            .json(tx)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(transaction_id = tx.id, gateway_id = tx.gateway_id, "Transaction delivered to gateway");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DispatchError::Rejected {
            gateway_id: tx.gateway_id,
            transaction_id: tx.id,
            reason: format!("{status}: {body}"),
        })
    }
}

/// Dispatcher for deployments where gateways are not reachable over HTTP yet:
/// every transaction is acknowledged without being delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptingDispatchClient;

#[async_trait]
impl DispatchClient for AcceptingDispatchClient {
    async fn send(&self, tx: &Transaction) -> Result<(), DispatchError> {
        tracing::debug!(transaction_id = tx.id, gateway_id = tx.gateway_id, "Dispatch accepted without delivery");
        Ok(())
    }
}
