use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::Gateway;
use crate::ports::{DirectoryError, GatewayDirectory};

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("no gateways available for the specified country")]
    NoGatewayAvailable,
    #[error("gateways are unhealthy/unavailable")]
    AllGatewaysUnhealthy,
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Liveness predicate consulted for each eligible gateway in priority order.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn is_healthy(&self, gateway: &Gateway) -> bool;
}

/// Reports every gateway healthy. Deployments should supply a real check.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthCheck for AlwaysHealthy {
    async fn is_healthy(&self, _gateway: &Gateway) -> bool {
        true
    }
}

#[async_trait]
impl<F> HealthCheck for F
where
    F: Fn(&Gateway) -> bool + Send + Sync,
{
    async fn is_healthy(&self, gateway: &Gateway) -> bool {
        self(gateway)
    }
}

#[async_trait]
pub trait GatewaySelector: Send + Sync {
    async fn select(&self, country_id: i32) -> Result<Gateway, SelectionError>;
}

/// Picks the most preferred (lowest priority value) healthy gateway for a country.
#[derive(Clone)]
pub struct PriorityGatewaySelector {
    directory: Arc<dyn GatewayDirectory>,
    health: Arc<dyn HealthCheck>,
}

impl PriorityGatewaySelector {
    pub fn new(directory: Arc<dyn GatewayDirectory>) -> Self {
        Self::with_health_check(directory, Arc::new(AlwaysHealthy))
    }

    pub fn with_health_check(directory: Arc<dyn GatewayDirectory>, health: Arc<dyn HealthCheck>) -> Self {
        Self { directory, health }
    }
}

#[async_trait]
impl GatewaySelector for PriorityGatewaySelector {
    async fn select(&self, country_id: i32) -> Result<Gateway, SelectionError> {
        let mut gateways = self
            .directory
            .gateways_for_country(country_id)
            .await
            .map_err(|e| {
                tracing::error!(country_id, error = %e, "Failed to query gateways");
                e
            })?;

        if gateways.is_empty() {
            return Err(SelectionError::NoGatewayAvailable);
        }

        // stable: equal priorities keep directory order
        gateways.sort_by_key(|g| g.priority);

        for gateway in gateways {
            if self.health.is_healthy(&gateway).await {
                tracing::debug!(country_id, gateway_id = gateway.id, priority = gateway.priority, "Gateway selected");
                return Ok(gateway);
            }
            tracing::warn!(country_id, gateway_id = gateway.id, "Skipping unhealthy gateway");
        }

        Err(SelectionError::AllGatewaysUnhealthy)
    }
}
