pub mod transactions;

use crate::resilience::CircuitState;
use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub event_bus_circuit: String,
}

/// Liveness plus the state of the event-bus circuit breaker. An open circuit
/// reports `degraded`: transactions are still accepted and persisted but their
/// events are not being published.
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let circuit = state.event_breaker.state();
    let status = if circuit == CircuitState::Open {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        event_bus_circuit: circuit.to_string(),
    })
}
