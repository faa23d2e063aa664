//! Postgres implementation of TransactionStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{NewTransaction, Transaction, TransactionType};
use crate::ports::{StoreError, StoreResult, TransactionStore};

/// Postgres-backed transaction store. Ids come from the `transactions.id`
/// sequence, so concurrent inserts never collide.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn create(&self, tx: NewTransaction) -> StoreResult<Transaction> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (amount, type, status, gateway_id, country_id, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&tx.amount)
        .bind(tx.transaction_type.as_str())
        .bind(&tx.status)
        .bind(tx.gateway_id)
        .bind(tx.country_id)
        .bind(tx.user_id)
        .bind(tx.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(tx.persisted(id))
    }

    async fn update_status(&self, id: i64, status: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE transactions SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, amount, type, status, user_id, gateway_id, country_id, created_at
            FROM transactions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(StoreError::NotFound(id))?.into_domain()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    amount: BigDecimal,
    #[sqlx(rename = "type")]
    transaction_type: String,
    status: String,
    user_id: i64,
    gateway_id: i32,
    country_id: i32,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let transaction_type = TransactionType::parse(&self.transaction_type).ok_or_else(|| {
            StoreError::InvalidRecord(format!(
                "transaction {} has unknown type '{}'",
                self.id, self.transaction_type
            ))
        })?;

        Ok(Transaction {
            id: self.id,
            amount: self.amount,
            transaction_type,
            status: self.status,
            user_id: self.user_id,
            gateway_id: self.gateway_id,
            country_id: self.country_id,
            created_at: self.created_at,
        })
    }
}
