//! Runs against a live database when DATABASE_URL is set; otherwise each test
//! returns early.

use bigdecimal::BigDecimal;
use sqlx::{migrate::Migrator, PgPool};
use std::path::Path;

use paygate_core::adapters::{PostgresGatewayDirectory, PostgresTransactionStore};
use paygate_core::domain::{NewTransaction, TransactionType};
use paygate_core::ports::{GatewayDirectory, StoreError, TransactionStore};

async fn setup_pool() -> Option<PgPool> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        }
    };

    let pool = PgPool::connect(&database_url).await.unwrap();
    let migrator = Migrator::new(Path::join(Path::new(env!("CARGO_MANIFEST_DIR")), "migrations"))
        .await
        .unwrap();
    migrator.run(&pool).await.unwrap();
    Some(pool)
}

/// Inserts a gateway serving `country_id` and returns its id.
async fn seed_gateway(pool: &PgPool, name: &str, priority: i32, country_id: i32) -> i32 {
    sqlx::query("INSERT INTO countries (id, name, code) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING")
        .bind(country_id)
        .bind(format!("country-{country_id}"))
        .bind(format!("{:03}", country_id % 1000))
        .execute(pool)
        .await
        .unwrap();

    let gateway_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO gateways (name, data_format_supported, priority)
        VALUES ($1, 'application/json', $2)
        ON CONFLICT (name) DO UPDATE SET priority = EXCLUDED.priority
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(priority)
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query("INSERT INTO gateway_countries (gateway_id, country_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(gateway_id)
        .bind(country_id)
        .execute(pool)
        .await
        .unwrap();

    gateway_id
}

#[tokio::test]
async fn test_create_assigns_id_and_round_trips() {
    let Some(pool) = setup_pool().await else { return };
    let gateway_id = seed_gateway(&pool, "store-test-gateway", 1, 840).await;
    let store = PostgresTransactionStore::new(pool);

    let created = store
        .create(NewTransaction::pending(
            BigDecimal::from(100_i64),
            TransactionType::Deposit,
            1,
            gateway_id,
            840,
        ))
        .await
        .unwrap();
    assert!(created.id > 0);

    let fetched = store.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.transaction_type, TransactionType::Deposit);
    assert_eq!(fetched.status, "pending");
    assert_eq!(fetched.gateway_id, gateway_id);
    assert_eq!(fetched.amount, BigDecimal::from(100_i64));
}

#[tokio::test]
async fn test_update_status() {
    let Some(pool) = setup_pool().await else { return };
    let gateway_id = seed_gateway(&pool, "store-test-gateway", 1, 840).await;
    let store = PostgresTransactionStore::new(pool);

    let created = store
        .create(NewTransaction::pending(
            BigDecimal::from(5_i64),
            TransactionType::Withdrawal,
            2,
            gateway_id,
            840,
        ))
        .await
        .unwrap();

    store.update_status(created.id, "completed").await.unwrap();
    assert_eq!(store.get_by_id(created.id).await.unwrap().status, "completed");
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let Some(pool) = setup_pool().await else { return };
    let store = PostgresTransactionStore::new(pool);

    let result = store.update_status(i64::MAX, "completed").await;
    assert!(matches!(result, Err(StoreError::NotFound(id)) if id == i64::MAX));
}

#[tokio::test]
async fn test_directory_filters_by_country() {
    let Some(pool) = setup_pool().await else { return };
    seed_gateway(&pool, "directory-test-br", 3, 76).await;
    seed_gateway(&pool, "directory-test-us", 2, 840).await;
    let directory = PostgresGatewayDirectory::new(pool);

    let gateways = directory.gateways_for_country(76).await.unwrap();

    assert!(gateways.iter().any(|g| g.name == "directory-test-br"));
    assert!(gateways.iter().all(|g| g.country_id == 76));
}
