pub mod http_dispatch_client;
#[cfg(feature = "kafka")]
pub mod kafka_bus;
pub mod memory;
pub mod postgres_gateway_directory;
pub mod postgres_transaction_store;

pub use http_dispatch_client::{AcceptingDispatchClient, HttpDispatchClient};
#[cfg(feature = "kafka")]
pub use kafka_bus::KafkaMessageBus;
pub use postgres_gateway_directory::PostgresGatewayDirectory;
pub use postgres_transaction_store::PostgresTransactionStore;
