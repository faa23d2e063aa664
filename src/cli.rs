use clap::{Parser, Subcommand};

use crate::adapters::PostgresTransactionStore;
use crate::config::Config;
use crate::ports::{StoreError, TransactionStore};

#[derive(Parser)]
#[command(name = "paygate-core")]
#[command(about = "Paygate Core - payment transaction orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Overwrite the status of a transaction, e.g. after a failed compensation
    SetStatus {
        #[arg(value_name = "TX_ID")]
        tx_id: i64,

        #[arg(value_name = "STATUS")]
        status: String,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

/// Operator override for a transaction's status, e.g. one left `pending`
/// after a failed compensation.
pub async fn handle_tx_set_status(config: &Config, tx_id: i64, status: &str) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;
    set_status(&PostgresTransactionStore::new(pool), tx_id, status).await?;

    println!("✓ Transaction {} set to {}", tx_id, status);
    Ok(())
}

async fn set_status(store: &dyn TransactionStore, tx_id: i64, status: &str) -> Result<(), StoreError> {
    match store.update_status(tx_id, status).await {
        Ok(()) => {
            tracing::info!(transaction_id = tx_id, status, "Transaction status set by operator");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(transaction_id = tx_id, status, error = %e, "Failed to set transaction status");
            Err(e)
        }
    }
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!(
        "  Kafka Brokers: {}",
        config.kafka_broker_url.as_deref().unwrap_or("(not set, serve will not start)")
    );
    println!(
        "  Gateway Dispatch URL: {}",
        config.gateway_dispatch_url.as_deref().unwrap_or("(none, accept all)")
    );
    println!(
        "  Retry attempts: dispatch={} publish={}",
        config.dispatch_max_attempts, config.publish_max_attempts
    );
    println!(
        "  Circuit breaker: threshold={} reset={}s call_timeout={}s",
        config.breaker_failure_threshold, config.breaker_reset_secs, config.breaker_call_timeout_secs
    );

    println!("✓ Configuration is valid");
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
