use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::resilience::RetryPolicy;

/// Connects to Postgres, retrying with `DB_CONNECT_MAX_ATTEMPTS` so the service
/// can start before the database is ready.
pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    let database_url = config.database_url.as_str();
    connect_with_retry(&config.db_connect_retry(), || {
        PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
    })
    .await
}

async fn connect_with_retry<F, Fut>(policy: &RetryPolicy, connect: F) -> Result<PgPool, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PgPool, sqlx::Error>>,
{
    let pool = policy.run("connect_database", connect).await.map_err(|e| {
        tracing::error!(error = %e, "Could not connect to the database");
        e
    })?;
    tracing::info!("Database connection established");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}
