pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod ports;
pub mod resilience;
pub mod services;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::resilience::CircuitBreaker;
use crate::services::{GatewaySelector, TransactionOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransactionOrchestrator>,
    pub selector: Arc<dyn GatewaySelector>,
    /// Shared with the event publisher; read for health reporting.
    pub event_breaker: CircuitBreaker,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/deposit", post(handlers::transactions::deposit))
        .route("/withdrawal", post(handlers::transactions::withdrawal))
        .route("/call_back", get(handlers::transactions::callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
