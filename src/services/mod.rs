pub mod gateway_selector;
pub mod orchestrator;
pub mod publisher;

pub use gateway_selector::{AlwaysHealthy, GatewaySelector, HealthCheck, PriorityGatewaySelector, SelectionError};
pub use orchestrator::{ErrorKind, TransactionError, TransactionOrchestrator};
pub use publisher::{EventPublisher, PublishError, ResilientPublisher};
