use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate_core::adapters::{
    AcceptingDispatchClient, HttpDispatchClient, PostgresGatewayDirectory, PostgresTransactionStore,
};
use paygate_core::cli::{Cli, Commands, DbCommands, TxCommands};
use paygate_core::config::Config;
use paygate_core::ports::{DispatchClient, MessageBus};
use paygate_core::resilience::CircuitBreaker;
use paygate_core::services::{EventPublisher, PriorityGatewaySelector, ResilientPublisher, TransactionOrchestrator};
use paygate_core::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(config.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    match cli.command {
        Some(Commands::Tx(TxCommands::SetStatus { tx_id, status })) => {
            paygate_core::cli::handle_tx_set_status(&config, tx_id, &status).await
        }
        Some(Commands::Db(DbCommands::Migrate)) => paygate_core::cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => paygate_core::cli::handle_config_validate(&config),
        Some(Commands::Serve) | None => serve(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let bus = message_bus(&config)?;

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let dispatch: Arc<dyn DispatchClient> = match &config.gateway_dispatch_url {
        Some(url) => {
            tracing::info!("Gateway dispatch client initialized with URL: {}", url);
            Arc::new(HttpDispatchClient::new(url.clone()))
        }
        None => {
            tracing::warn!("GATEWAY_DISPATCH_URL not set, gateway dispatch accepts every transaction");
            Arc::new(AcceptingDispatchClient)
        }
    };

    let breaker = CircuitBreaker::new("kafka-publisher", config.circuit_breaker());
    let publisher = Arc::new(ResilientPublisher::new(bus, breaker.clone(), config.publish_retry()));

    let orchestrator = TransactionOrchestrator::new(
        Arc::new(PostgresTransactionStore::new(pool.clone())),
        dispatch,
        publisher.clone(),
    )
    .with_dispatch_retry(config.dispatch_retry())
    .with_publish_timeout(config.publish_timeout());

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        selector: Arc::new(PriorityGatewaySelector::new(Arc::new(PostgresGatewayDirectory::new(pool)))),
        event_breaker: breaker,
    };

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = publisher.close().await {
        tracing::error!(error = %e, "Failed to close event publisher");
    }

    Ok(())
}

#[cfg(feature = "kafka")]
fn message_bus(config: &Config) -> anyhow::Result<Arc<dyn MessageBus>> {
    let bus = paygate_core::adapters::KafkaMessageBus::from_config(config)?;
    tracing::info!("Kafka message bus initialized with brokers: {}", bus.brokers());
    Ok(Arc::new(bus))
}

#[cfg(not(feature = "kafka"))]
fn message_bus(_config: &Config) -> anyhow::Result<Arc<dyn MessageBus>> {
    anyhow::bail!("built without the kafka feature; transaction events cannot be published")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
